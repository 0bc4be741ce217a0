//! DDL statement builder.
//!
//! Every table and column name is re-checked with the identifier guard and
//! emitted quoted, so a record loaded from a tampered catalog still cannot
//! smuggle SQL into a statement.

use crate::types::FieldDef;
use crate::validate::PRIMARY_KEY_COLUMN;
use dyntables_db::{quote_ident, validate_identifier, Result};

/// `CREATE TABLE` with the implicit primary key followed by `fields` in order.
pub fn create_table(table: &str, fields: &[FieldDef]) -> Result<String> {
    validate_identifier("table name", table)?;

    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push(format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(PRIMARY_KEY_COLUMN)
    ));
    for field in fields {
        columns.push(column_def(field)?);
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        columns.join(", ")
    ))
}

pub fn drop_table_if_exists(table: &str) -> Result<String> {
    validate_identifier("table name", table)?;
    Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
}

/// One `ALTER TABLE ... ADD COLUMN` per field, in order.
///
/// SQLite accepts a single `ADD COLUMN` clause per `ALTER TABLE`, so the
/// append is a statement list rather than one comma-joined statement.
pub fn add_columns(table: &str, fields: &[FieldDef]) -> Result<Vec<String>> {
    validate_identifier("table name", table)?;
    let table = quote_ident(table);
    fields
        .iter()
        .map(|field| Ok(format!("ALTER TABLE {} ADD COLUMN {}", table, column_def(field)?)))
        .collect()
}

fn column_def(field: &FieldDef) -> Result<String> {
    validate_identifier("column name", &field.name)?;
    Ok(format!(
        "{} {}",
        quote_ident(&field.name),
        field.field_type.physical_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use dyntables_db::DbError;

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("email", FieldType::String),
            FieldDef::new("age", FieldType::Number),
            FieldDef::new("active", FieldType::Boolean),
        ]
    }

    #[test]
    fn test_create_table() {
        let sql = create_table("users", &fields()).unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "users" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "email" varchar(255), "age" text, "active" boolean)"#
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            drop_table_if_exists("users").unwrap(),
            r#"DROP TABLE IF EXISTS "users""#
        );
    }

    #[test]
    fn test_add_columns_one_statement_per_field() {
        let stmts = add_columns("users", &fields()[1..]).unwrap();
        assert_eq!(
            stmts,
            vec![
                r#"ALTER TABLE "users" ADD COLUMN "age" text"#.to_string(),
                r#"ALTER TABLE "users" ADD COLUMN "active" boolean"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let err = create_table("users\"; DROP TABLE x; --", &fields()).unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier { .. }));

        let bad = vec![FieldDef::new("a b", FieldType::String)];
        assert!(create_table("users", &bad).is_err());
        assert!(add_columns("users", &bad).is_err());
    }
}
