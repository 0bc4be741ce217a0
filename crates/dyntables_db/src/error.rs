//! Error types for the database layer.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, statement execution, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (creating the database directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A table or column name that must not be interpolated into DDL
    #[error("Invalid {kind} '{name}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// One statement of a DDL batch failed; the whole batch was rolled back
    #[error("DDL statement {index} failed: {source}")]
    Statement {
        index: usize,
        #[source]
        source: sqlx::Error,
    },

    /// Another writer kept the database write lock past the timeout
    #[error("Timed out waiting for the write lock on {0}")]
    Locked(PathBuf),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation (unique, check, etc.)
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a constraint error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Whether the driver reported a UNIQUE key violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlx(sqlx::Error::Database(db_err))
            | Self::Statement {
                source: sqlx::Error::Database(db_err),
                ..
            } => db_err.is_unique_violation(),
            Self::Constraint(_) => true,
            _ => false,
        }
    }
}
