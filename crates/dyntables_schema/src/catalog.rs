//! Schema Catalog
//!
//! One `table_metadata` row per managed table: its name and its current
//! field list (JSON). The catalog is the source of truth for which fields a
//! table has; the live table is the source of truth for its data.

use crate::types::{FieldDef, TableId};
use chrono::{DateTime, Utc};
use dyntables_db::{DbConnection, DbError};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

/// Name of the catalog's own backing table.
pub const CATALOG_TABLE: &str = "table_metadata";

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Table record not found: {0}")]
    NotFound(TableId),

    #[error("Table name already registered: {0}")]
    UniquenessViolation(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Database(DbError::from(err))
    }
}

/// The catalog entity: one managed table and its current fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchemaRecord {
    pub id: TableId,
    pub table_name: String,
    /// Ordered field list, excluding the implicit primary key
    pub fields: Vec<FieldDef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database-backed table catalog.
#[derive(Clone)]
pub struct SchemaCatalog {
    conn: DbConnection,
}

impl SchemaCatalog {
    /// Create a catalog on the given connection, creating its table if needed.
    pub async fn new(conn: DbConnection) -> Result<Self, CatalogError> {
        let catalog = Self { conn };
        catalog.init_tables().await?;
        Ok(catalog)
    }

    async fn init_tables(&self) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS table_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                fields TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(self.conn.pool())
        .await?;
        Ok(())
    }

    /// Look up a record by id.
    pub async fn get(&self, id: TableId) -> Result<Option<TableSchemaRecord>, CatalogError> {
        let row = sqlx::query(
            r#"
            SELECT id, table_name, fields, created_at, updated_at
            FROM table_metadata
            WHERE id = ?
            "#,
        )
        .bind(id.get())
        .fetch_optional(self.conn.pool())
        .await?;

        row.map(row_to_record).transpose()
    }

    /// Look up a record by table name (case-insensitive, like the database).
    pub async fn get_by_name(
        &self,
        table_name: &str,
    ) -> Result<Option<TableSchemaRecord>, CatalogError> {
        let row = sqlx::query(
            r#"
            SELECT id, table_name, fields, created_at, updated_at
            FROM table_metadata
            WHERE table_name = ? COLLATE NOCASE
            "#,
        )
        .bind(table_name)
        .fetch_optional(self.conn.pool())
        .await?;

        row.map(row_to_record).transpose()
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Result<Vec<TableSchemaRecord>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT id, table_name, fields, created_at, updated_at
            FROM table_metadata
            ORDER BY id
            "#,
        )
        .fetch_all(self.conn.pool())
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Insert a new record.
    ///
    /// Fails with [`CatalogError::UniquenessViolation`] when the name is
    /// already in the catalog, whether or not the live table exists.
    pub async fn create(
        &self,
        table_name: &str,
        fields: &[FieldDef],
    ) -> Result<TableSchemaRecord, CatalogError> {
        let fields_json = serde_json::to_string(fields)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO table_metadata (table_name, fields, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(table_name)
        .bind(&fields_json)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(self.conn.pool())
        .await
        .map_err(DbError::from)
        .map_err(|err| {
            if err.is_unique_violation() {
                CatalogError::UniquenessViolation(table_name.to_string())
            } else {
                CatalogError::Database(err)
            }
        })?;

        Ok(TableSchemaRecord {
            id: TableId::new(result.last_insert_rowid()),
            table_name: table_name.to_string(),
            fields: fields.to_vec(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrite the record's field list.
    pub async fn replace_fields(
        &self,
        record: &mut TableSchemaRecord,
        new_fields: Vec<FieldDef>,
    ) -> Result<(), CatalogError> {
        let updated_at = self.write_fields(record.id, &new_fields).await?;
        record.fields = new_fields;
        record.updated_at = updated_at;
        Ok(())
    }

    /// Append to the record's field list, keeping existing order.
    ///
    /// No duplicate checking happens here; that belongs to validation.
    pub async fn append_fields(
        &self,
        record: &mut TableSchemaRecord,
        additional_fields: &[FieldDef],
    ) -> Result<(), CatalogError> {
        let mut combined = Vec::with_capacity(record.fields.len() + additional_fields.len());
        combined.extend_from_slice(&record.fields);
        combined.extend_from_slice(additional_fields);

        let updated_at = self.write_fields(record.id, &combined).await?;
        record.fields = combined;
        record.updated_at = updated_at;
        Ok(())
    }

    async fn write_fields(
        &self,
        id: TableId,
        fields: &[FieldDef],
    ) -> Result<DateTime<Utc>, CatalogError> {
        let fields_json = serde_json::to_string(fields)?;
        let now = Utc::now();

        let result = sqlx::query("UPDATE table_metadata SET fields = ?, updated_at = ? WHERE id = ?")
            .bind(&fields_json)
            .bind(now.to_rfc3339())
            .bind(id.get())
            .execute(self.conn.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(now)
    }
}

fn row_to_record(row: SqliteRow) -> Result<TableSchemaRecord, CatalogError> {
    let fields_json: String = row.try_get("fields")?;
    let fields: Vec<FieldDef> = serde_json::from_str(&fields_json)?;

    Ok(TableSchemaRecord {
        id: TableId::new(row.try_get("id")?),
        table_name: row.try_get("table_name")?,
        fields,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, CatalogError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CatalogError::Parse(format!("invalid timestamp '{}': {}", raw, e)))
}
