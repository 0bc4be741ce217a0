//! Schema engine errors.

use crate::catalog::CatalogError;
use crate::types::TableId;
use dyntables_db::DbError;
use std::fmt;
use thiserror::Error;

/// One problem with one field of a request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
    /// Position in the submitted field list; `None` for request-level issues.
    pub index: Option<usize>,
    pub name: String,
    pub message: String,
}

impl FieldIssue {
    pub(crate) fn at(index: usize, name: &str, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn request(name: &str, message: impl Into<String>) -> Self {
        Self {
            index: None,
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "fields[{}] '{}': {}", i, self.name, self.message),
            None => write!(f, "{}: {}", self.name, self.message),
        }
    }
}

/// Errors from schema engine operations.
///
/// Every variant except [`SchemaError::CatalogWrite`] means nothing was
/// committed to the catalog.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Validation failed: {}", join_issues(.issues))]
    Validation { issues: Vec<FieldIssue> },

    #[error("Table already exists: {table_name}")]
    AlreadyExists { table_name: String },

    #[error("Table not found: {id}")]
    NotFound { id: TableId },

    /// A DDL statement failed. The operation's statements run in one
    /// transaction, so none of them took effect and no catalog write followed.
    #[error("DDL failed on table '{table_name}' ({statement}): {source}")]
    Ddl {
        table_name: String,
        statement: String,
        #[source]
        source: DbError,
    },

    /// DDL succeeded but the catalog write did not; the catalog no longer
    /// mirrors the live table and needs manual reconciliation.
    #[error("Catalog out of sync for table '{table_name}' after {operation}: {source}")]
    CatalogWrite {
        table_name: String,
        operation: &'static str,
        #[source]
        source: CatalogError,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Coarse classification for outer layers (status codes, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    AlreadyExists,
    NotFound,
    DdlFailure,
    Inconsistent,
    Internal,
}

impl SchemaError {
    pub(crate) fn validation(issues: Vec<FieldIssue>) -> Self {
        Self::Validation { issues }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ddl { .. } => ErrorKind::DdlFailure,
            Self::CatalogWrite { .. } => ErrorKind::Inconsistent,
            Self::Catalog(_) | Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// Field issues for a validation failure, empty otherwise.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Self::Validation { issues } => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_issue() {
        let err = SchemaError::validation(vec![
            FieldIssue::at(0, "a", "unknown type 'integer'"),
            FieldIssue::request("table_name", "must not be empty"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: fields[0] 'a': unknown type 'integer'; table_name: must not be empty"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_kinds() {
        let err = SchemaError::NotFound { id: TableId::new(7) };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.issues().is_empty());

        let err = SchemaError::CatalogWrite {
            table_name: "t".to_string(),
            operation: "provision",
            source: CatalogError::NotFound(TableId::new(1)),
        };
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
    }
}
