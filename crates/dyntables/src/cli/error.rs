//! Helpful error types for CLI commands
//!
//! Every error includes what went wrong, optionally what was being done at
//! the time, and suggestions for fixing it. Errors coming from the schema
//! engine keep their [`ErrorKind`] so the process exit code can follow it.

use dyntables_schema::{ErrorKind, SchemaError};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
    /// Engine error category, when the error came from the engine
    pub kind: Option<ErrorKind>,
    /// Per-field validation problems
    pub issues: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            kind: None,
            issues: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// The database file could not be opened
    pub fn database_open_failed(path: &Path, err: impl fmt::Display) -> Self {
        Self::new("Failed to open database")
            .with_context(format!("Database: {}", path.display()))
            .with_suggestions([
                format!("Error: {}", err),
                "TRY: Check file permissions on the database and its directory".to_string(),
                "TRY: Point at another file with --db or DYNTABLES_DB".to_string(),
            ])
    }

    /// Translate an engine error, keeping its kind.
    pub fn from_schema(err: &SchemaError) -> Self {
        let kind = err.kind();
        let mut helpful = match err {
            SchemaError::Validation { issues } => Self::new("Invalid table definition")
                .with_context(format!("{} problem(s) found, nothing was changed", issues.len()))
                .with_suggestions([
                    "TRY: Field types are string, number or boolean",
                    "TRY: Names start with a letter or underscore and use only [A-Za-z0-9_]",
                    "TRY: 'id' is added automatically and cannot be declared",
                ]),
            SchemaError::AlreadyExists { table_name } => {
                Self::new(format!("Table already exists: {}", table_name))
                    .with_context("Provisioning never modifies an existing table")
                    .with_suggestions([
                        "TRY: dyntables list   # Find the table's id".to_string(),
                        "TRY: dyntables replace <ID> --field NAME:TYPE ...".to_string(),
                    ])
            }
            SchemaError::NotFound { id } => Self::new(format!("Table not found: {}", id))
                .with_context("No catalog record has this id")
                .with_suggestion("TRY: dyntables list   # Show managed tables and their ids"),
            SchemaError::Ddl {
                table_name,
                statement,
                source,
            } => Self::new(format!("Database rejected the change to '{}'", table_name))
                .with_context(format!(
                    "`{}` failed; the change was rolled back and the catalog was not updated",
                    statement
                ))
                .with_suggestions([
                    format!("Error: {}", source),
                    format!(
                        "TRY: dyntables check <ID>   # Compare '{}' with its catalog record",
                        table_name
                    ),
                ]),
            SchemaError::CatalogWrite {
                table_name,
                operation,
                source,
            } => Self::new(format!(
                "Table '{}' was changed but its catalog record was not",
                table_name
            ))
            .with_context(format!(
                "The {} DDL succeeded; the catalog write failed and needs manual reconciliation",
                operation
            ))
            .with_suggestions([
                format!("Error: {}", source),
                "TRY: dyntables check <ID>   # List the differences".to_string(),
            ]),
            SchemaError::Catalog(_) | SchemaError::Database(_) => Self::new(err.to_string())
                .with_suggestion("TRY: Re-run with -v for details"),
        };
        helpful.kind = Some(kind);
        helpful.issues = err.issues().iter().map(|i| i.to_string()).collect();
        helpful
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        self.kind.map(exit_code_for).unwrap_or(1)
    }

    /// Machine-readable form used under `--json`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind.map(kind_name).unwrap_or("error"),
                "message": self.message,
                "context": self.context,
                "issues": self.issues,
                "suggestions": self.suggestions,
            }
        })
    }
}

impl From<SchemaError> for HelpfulError {
    fn from(err: SchemaError) -> Self {
        Self::from_schema(&err)
    }
}

/// Exit codes: validation 2, exists 3, not found 4, DDL 5, inconsistent 6.
pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 2,
        ErrorKind::AlreadyExists => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::DdlFailure => 5,
        ErrorKind::Inconsistent => 6,
        ErrorKind::Internal => 1,
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::AlreadyExists => "already_exists",
        ErrorKind::NotFound => "not_found",
        ErrorKind::DdlFailure => "ddl_failure",
        ErrorKind::Inconsistent => "inconsistent",
        ErrorKind::Internal => "internal",
    }
}

/// Exit code for any command error.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.exit_code();
    }
    if let Some(schema) = err.downcast_ref::<SchemaError>() {
        return exit_code_for(schema.kind());
    }
    1
}

/// Print an error as JSON on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let value = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.to_json(),
        None => HelpfulError::new(format!("{:#}", err)).to_json(),
    };
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:#}", err),
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;
    use dyntables_schema::{FieldSpec, SchemaEngine, TableId};

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While provisioning")
            .with_suggestion("TRY: again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While provisioning"));
        assert!(display.contains("  TRY: again"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(ErrorKind::Validation), 2);
        assert_eq!(exit_code_for(ErrorKind::AlreadyExists), 3);
        assert_eq!(exit_code_for(ErrorKind::NotFound), 4);
        assert_eq!(exit_code_for(ErrorKind::DdlFailure), 5);
        assert_eq!(exit_code_for(ErrorKind::Inconsistent), 6);
        assert_eq!(exit_code_for(ErrorKind::Internal), 1);
    }

    #[test]
    fn test_not_found_through_anyhow() {
        let helpful = HelpfulError::from(SchemaError::NotFound {
            id: TableId::new(42),
        });
        assert!(helpful.message.contains("42"));
        let err: anyhow::Error = helpful.into();
        assert_eq!(exit_code(&err), 4);
    }

    #[tokio::test]
    async fn test_validation_error_lists_issues() {
        let conn = dyntables_db::DbConnection::open_memory().await.unwrap();
        let engine = SchemaEngine::new(conn).await.unwrap();
        let err = engine
            .provision("users", &[FieldSpec::new("age", "integer")])
            .await
            .unwrap_err();

        let helpful = HelpfulError::from_schema(&err);
        assert_eq!(helpful.exit_code(), 2);
        assert_eq!(helpful.issues.len(), 1);
        assert!(helpful.issues[0].contains("unknown type 'integer'"));

        let json = helpful.to_json();
        assert_eq!(json["error"]["kind"], "validation");
        assert!(format!("{}", helpful).contains("  - fields[0] 'age'"));
    }
}
