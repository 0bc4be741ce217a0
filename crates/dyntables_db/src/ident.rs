//! Identifier guard for DDL.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up in a `CREATE`/`ALTER`/`DROP` statement goes through
//! [`validate_identifier`] first and is then emitted with [`quote_ident`].

use crate::error::{DbError, Result};

/// Longest identifier accepted; matches the catalog's `table_name` width.
pub const MAX_IDENTIFIER_LEN: usize = 255;

const RESERVED_PREFIXES: &[&str] = &["sqlite_"];

const RESERVED_WORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "ATTACH",
    "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST", "CHECK",
    "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS", "CURRENT",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT", "DEFERRABLE",
    "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH", "ELSE", "END",
    "ESCAPE", "EXCEPT", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FALSE", "FOR", "FOREIGN", "FROM",
    "FULL", "GRANT", "GROUP", "HAVING", "IF", "IN", "INDEX", "INITIALLY", "INNER", "INSERT",
    "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT",
    "NATURAL", "NOT", "NOTNULL", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "PLAN",
    "PRAGMA", "PRIMARY", "REFERENCES", "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT",
    "RETURNING", "REVOKE", "RIGHT", "ROLLBACK", "ROW", "SAVEPOINT", "SELECT", "SET", "TABLE",
    "TEMP", "TEMPORARY", "THEN", "TO", "TRANSACTION", "TRIGGER", "TRUE", "UNION", "UNIQUE",
    "UPDATE", "USER", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WITH",
];

/// Check that `name` is safe to interpolate as a table or column name.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to [`MAX_IDENTIFIER_LEN`] bytes that is
/// not a reserved word (case-insensitive) and has no engine-reserved prefix.
/// `kind` only feeds the error message ("table name", "column name", ...).
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<()> {
    let invalid = |reason: String| DbError::InvalidIdentifier {
        kind,
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("must not be empty".to_string()));
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter or underscore".to_string()));
    }
    if let Some(ch) = chars.find(|ch| !(*ch == '_' || ch.is_ascii_alphanumeric())) {
        return Err(invalid(format!("contains invalid character '{}'", ch)));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(format!(
            "longer than {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    let upper = name.to_ascii_uppercase();
    if RESERVED_WORDS.contains(&upper.as_str()) {
        return Err(invalid("is a reserved SQL keyword".to_string()));
    }
    let lower = name.to_ascii_lowercase();
    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| lower.starts_with(**p)) {
        return Err(invalid(format!("uses reserved prefix '{}'", prefix)));
    }

    Ok(())
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert!(validate_identifier("table name", "users").is_ok());
        assert!(validate_identifier("table name", "_staging").is_ok());
        assert!(validate_identifier("column name", "field_2").is_ok());
        assert!(validate_identifier("column name", "Email").is_ok());
    }

    #[test]
    fn test_rejects_injection_shapes() {
        assert!(validate_identifier("table name", "users; DROP TABLE x").is_err());
        assert!(validate_identifier("table name", "a b").is_err());
        assert!(validate_identifier("column name", "name\"").is_err());
        assert!(validate_identifier("column name", "1abc").is_err());
        assert!(validate_identifier("column name", "").is_err());
    }

    #[test]
    fn test_rejects_reserved_words_any_case() {
        assert!(validate_identifier("column name", "select").is_err());
        assert!(validate_identifier("column name", "Order").is_err());
        assert!(validate_identifier("table name", "TABLE").is_err());
        assert!(validate_identifier("table name", "sqlite_master").is_err());
    }

    #[test]
    fn test_rejects_overlong_names() {
        let name = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        let err = validate_identifier("table name", &name).unwrap_err();
        assert!(err.to_string().contains("longer than"));
        assert!(validate_identifier("table name", &"a".repeat(MAX_IDENTIFIER_LEN)).is_ok());
    }

    #[test]
    fn test_accepts_names_up_to_255_chars() {
        assert!(validate_identifier("table name", &"t".repeat(64)).is_ok());
        assert!(validate_identifier("column name", &"c".repeat(255)).is_ok());
        assert!(validate_identifier("column name", &"c".repeat(256)).is_err());
    }

    #[test]
    fn test_error_names_kind_and_value() {
        let err = validate_identifier("column name", "bad-name").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid column name 'bad-name': contains invalid character '-'"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
