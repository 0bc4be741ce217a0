//! Field list validation.
//!
//! Runs before any type mapping or DDL. Every problem in the request is
//! collected so the caller sees all offending fields at once.

use crate::catalog::CATALOG_TABLE;
use crate::error::{FieldIssue, SchemaError};
use crate::types::{FieldDef, FieldSpec, FieldType};
use dyntables_db::{validate_identifier, DbError};
use std::collections::HashSet;

/// Column managed by the engine itself; clients cannot declare it.
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Validate a table name for provisioning.
pub fn validate_table_name(table_name: &str) -> Result<(), SchemaError> {
    let issue = |message: String| SchemaError::validation(vec![FieldIssue::request("table_name", message)]);

    validate_identifier("table name", table_name).map_err(|e| issue(reason(e)))?;
    if table_name.eq_ignore_ascii_case(CATALOG_TABLE) {
        return Err(issue(format!("'{}' is reserved for the catalog", CATALOG_TABLE)));
    }
    Ok(())
}

/// Validate a requested field list.
///
/// `existing` is the record's current field list and is only passed on the
/// append path: names already present there are rejected as duplicates.
/// Names are compared case-insensitively because the database does.
pub fn validate_fields(
    specs: &[FieldSpec],
    existing: Option<&[FieldDef]>,
) -> Result<Vec<FieldDef>, SchemaError> {
    if specs.is_empty() {
        return Err(SchemaError::validation(vec![FieldIssue::request(
            "fields",
            "at least one field is required",
        )]));
    }

    let existing_names: HashSet<String> = existing
        .unwrap_or_default()
        .iter()
        .map(|f| f.name.to_ascii_lowercase())
        .collect();

    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    let mut defs = Vec::with_capacity(specs.len());

    for (index, spec) in specs.iter().enumerate() {
        let name = spec.name.as_str();
        let folded = name.to_ascii_lowercase();

        if name.is_empty() {
            issues.push(FieldIssue::at(index, name, "name must not be empty"));
        } else if let Err(e) = validate_identifier("column name", name) {
            issues.push(FieldIssue::at(index, name, reason(e)));
        } else if folded == PRIMARY_KEY_COLUMN {
            issues.push(FieldIssue::at(
                index,
                name,
                "'id' is the implicit primary key column",
            ));
        } else if existing_names.contains(&folded) {
            issues.push(FieldIssue::at(
                index,
                name,
                format!("Field with this '{}' name already exists.", name),
            ));
        } else if !seen.insert(folded) {
            issues.push(FieldIssue::at(index, name, "duplicate field name in request"));
        }

        match FieldType::parse(&spec.field_type) {
            Some(field_type) => defs.push(FieldDef::new(name, field_type)),
            None => issues.push(FieldIssue::at(
                index,
                name,
                format!(
                    "unknown type '{}' (expected one of: string, number, boolean)",
                    spec.field_type
                ),
            )),
        }
    }

    if issues.is_empty() {
        Ok(defs)
    } else {
        Err(SchemaError::validation(issues))
    }
}

fn reason(err: DbError) -> String {
    match err {
        DbError::InvalidIdentifier { reason, .. } => reason,
        other => other.to_string(),
    }
}
