//! Schema Engine
//!
//! Maps client field lists onto DDL against the live database and keeps the
//! catalog in step with it. Each mutation always runs in the same order:
//!
//! 1. validate (nothing touched on failure)
//! 2. take the table lock, then the database write lock
//! 3. DDL against the live table, in one transaction (no catalog write on failure)
//! 4. catalog write (failure here is reported as [`SchemaError::CatalogWrite`])
//!
//! The table lock orders tasks within one engine. The write lock is a file
//! beside the database and orders engines, including ones in other processes.

use crate::catalog::{SchemaCatalog, TableSchemaRecord};
use crate::ddl;
use crate::error::SchemaError;
use crate::locks::{TableLockGuard, TableLocks};
use crate::reader::RowReader;
use crate::types::{FieldDef, FieldSpec, TableId};
use crate::validate::{validate_fields, validate_table_name, PRIMARY_KEY_COLUMN};
use dyntables_db::{DbConnection, DbError, DbLockGuard};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Runtime table definition service.
#[derive(Clone)]
pub struct SchemaEngine {
    conn: DbConnection,
    catalog: SchemaCatalog,
    reader: RowReader,
    locks: TableLocks,
}

impl SchemaEngine {
    /// Build an engine on an explicit database handle.
    pub async fn new(conn: DbConnection) -> Result<Self, SchemaError> {
        let catalog = SchemaCatalog::new(conn.clone()).await?;
        Ok(Self {
            reader: RowReader::new(catalog.clone()),
            conn,
            catalog,
            locks: TableLocks::new(),
        })
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn connection(&self) -> &DbConnection {
        &self.conn
    }

    /// Create a new managed table and its catalog record.
    pub async fn provision(
        &self,
        table_name: &str,
        fields: &[FieldSpec],
    ) -> Result<TableSchemaRecord, SchemaError> {
        let fields = match (validate_table_name(table_name), validate_fields(fields, None)) {
            (Ok(()), Ok(fields)) => fields,
            (table_check, field_check) => {
                let mut issues = Vec::new();
                if let Err(e) = &table_check {
                    issues.extend_from_slice(e.issues());
                }
                if let Err(e) = &field_check {
                    issues.extend_from_slice(e.issues());
                }
                return Err(SchemaError::Validation { issues });
            }
        };

        let _guard = self.lock_table(table_name).await?;

        if self.conn.table_exists(table_name).await? {
            info!(table = table_name, "Provision rejected: table already exists");
            return Err(SchemaError::AlreadyExists {
                table_name: table_name.to_string(),
            });
        }

        let statement = ddl::create_table(table_name, &fields)?;
        self.run_ddl(table_name, &[statement]).await?;

        let record = self
            .catalog
            .create(table_name, &fields)
            .await
            .map_err(|source| catalog_write_failed(table_name, "provision", source))?;

        info!(
            table = table_name,
            id = %record.id,
            fields = record.fields.len(),
            "Table provisioned"
        );
        Ok(record)
    }

    /// Drop and recreate a table with a new field list. All rows are lost.
    pub async fn replace_schema(
        &self,
        id: TableId,
        new_fields: &[FieldSpec],
    ) -> Result<TableSchemaRecord, SchemaError> {
        let record = self.require(id).await?;
        let new_fields = validate_fields(new_fields, None)?;

        let (_guard, mut record) = self.lock_record(record).await?;

        let statements = [
            ddl::drop_table_if_exists(&record.table_name)?,
            ddl::create_table(&record.table_name, &new_fields)?,
        ];
        self.run_ddl(&record.table_name, &statements).await?;

        self.catalog
            .replace_fields(&mut record, new_fields)
            .await
            .map_err(|source| catalog_write_failed(&record.table_name, "replace", source))?;

        info!(
            table = %record.table_name,
            id = %record.id,
            fields = record.fields.len(),
            "Table schema replaced"
        );
        Ok(record)
    }

    /// Add columns to a table, keeping its rows.
    pub async fn append_fields(
        &self,
        id: TableId,
        additional_fields: &[FieldSpec],
    ) -> Result<TableSchemaRecord, SchemaError> {
        let record = self.require(id).await?;
        let (_guard, mut record) = self.lock_record(record).await?;

        // Checked against the record as re-read under the lock, so two
        // concurrent appends cannot both add the same name.
        let additional = validate_fields(additional_fields, Some(record.fields.as_slice()))?;

        let statements = ddl::add_columns(&record.table_name, &additional)?;
        self.run_ddl(&record.table_name, &statements).await?;

        self.catalog
            .append_fields(&mut record, &additional)
            .await
            .map_err(|source| catalog_write_failed(&record.table_name, "append", source))?;

        info!(
            table = %record.table_name,
            id = %record.id,
            added = additional.len(),
            fields = record.fields.len(),
            "Table fields appended"
        );
        Ok(record)
    }

    /// Current field list of a table.
    pub async fn read_schema(&self, id: TableId) -> Result<Vec<FieldDef>, SchemaError> {
        self.reader.fields(id).await
    }

    /// Full catalog record of a table.
    pub async fn get(&self, id: TableId) -> Result<TableSchemaRecord, SchemaError> {
        self.require(id).await
    }

    /// All managed tables.
    pub async fn list_tables(&self) -> Result<Vec<TableSchemaRecord>, SchemaError> {
        Ok(self.catalog.list().await?)
    }

    /// Compare a record's fields with the live table's columns. Read-only.
    pub async fn check_consistency(&self, id: TableId) -> Result<ConsistencyReport, SchemaError> {
        let record = self.require(id).await?;

        if !self.conn.table_exists(&record.table_name).await? {
            return Ok(ConsistencyReport {
                id,
                table_name: record.table_name,
                table_exists: false,
                missing_columns: record.fields.into_iter().map(|f| f.name).collect(),
                extra_columns: Vec::new(),
                type_mismatches: Vec::new(),
            });
        }

        let live: HashMap<String, (String, String)> = self
            .conn
            .table_columns(&record.table_name)
            .await?
            .into_iter()
            .filter(|c| !c.name.eq_ignore_ascii_case(PRIMARY_KEY_COLUMN))
            .map(|c| (c.name.to_ascii_lowercase(), (c.name, c.declared_type)))
            .collect();

        let mut missing_columns = Vec::new();
        let mut type_mismatches = Vec::new();
        for field in &record.fields {
            match live.get(&field.name.to_ascii_lowercase()) {
                None => missing_columns.push(field.name.clone()),
                Some((_, declared)) => {
                    let expected = field.field_type.physical_type();
                    if !declared.eq_ignore_ascii_case(expected) {
                        type_mismatches.push(TypeMismatch {
                            column: field.name.clone(),
                            expected: expected.to_string(),
                            actual: declared.clone(),
                        });
                    }
                }
            }
        }

        let known: Vec<String> = record
            .fields
            .iter()
            .map(|f| f.name.to_ascii_lowercase())
            .collect();
        let mut extra_columns: Vec<String> = live
            .into_iter()
            .filter(|(key, _)| !known.contains(key))
            .map(|(_, (name, _))| name)
            .collect();
        extra_columns.sort();

        let report = ConsistencyReport {
            id,
            table_name: record.table_name,
            table_exists: true,
            missing_columns,
            extra_columns,
            type_mismatches,
        };
        if !report.is_consistent() {
            warn!(table = %report.table_name, id = %id, "Catalog does not match live table");
        }
        Ok(report)
    }

    async fn require(&self, id: TableId) -> Result<TableSchemaRecord, SchemaError> {
        self.catalog
            .get(id)
            .await?
            .ok_or(SchemaError::NotFound { id })
    }

    async fn lock_table(&self, table_name: &str) -> Result<WriteGuard, SchemaError> {
        let table = self.locks.lock(table_name).await;
        let db = self.conn.lock_for_write().await?;
        Ok(WriteGuard {
            _db: db,
            _table: table,
        })
    }

    /// Take both locks, then re-read the record so the caller works on the
    /// state left by whichever mutation held them before, in this process
    /// or another.
    async fn lock_record(
        &self,
        record: TableSchemaRecord,
    ) -> Result<(WriteGuard, TableSchemaRecord), SchemaError> {
        let guard = self.lock_table(&record.table_name).await?;
        let fresh = self.require(record.id).await?;
        Ok((guard, fresh))
    }

    async fn run_ddl(&self, table_name: &str, statements: &[String]) -> Result<(), SchemaError> {
        self.conn
            .execute_ddl_batch(statements)
            .await
            .map_err(|err| {
                let (statement, source) = match err {
                    DbError::Statement { index, source } => (
                        statements.get(index).cloned().unwrap_or_default(),
                        DbError::Sqlx(source),
                    ),
                    other => ("BEGIN/COMMIT".to_string(), other),
                };
                warn!(table = table_name, %statement, error = %source, "DDL rolled back");
                SchemaError::Ddl {
                    table_name: table_name.to_string(),
                    statement,
                    source,
                }
            })
    }
}

/// Held for the whole check-DDL-catalog sequence of one mutation.
/// Fields drop in order, so the write lock is released before the table lock.
struct WriteGuard {
    _db: Option<DbLockGuard>,
    _table: TableLockGuard,
}

fn catalog_write_failed(
    table_name: &str,
    operation: &'static str,
    source: crate::catalog::CatalogError,
) -> SchemaError {
    error!(
        table = table_name,
        operation,
        error = %source,
        "Catalog write failed after DDL succeeded; manual reconciliation required"
    );
    SchemaError::CatalogWrite {
        table_name: table_name.to_string(),
        operation,
        source,
    }
}

/// A column whose live declared type differs from what the catalog implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Differences between a catalog record and its live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub id: TableId,
    pub table_name: String,
    pub table_exists: bool,
    /// In the catalog but not in the live table
    pub missing_columns: Vec<String>,
    /// In the live table but not in the catalog
    pub extra_columns: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.table_exists
            && self.missing_columns.is_empty()
            && self.extra_columns.is_empty()
            && self.type_mismatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::FieldType;

    async fn engine() -> SchemaEngine {
        let conn = DbConnection::open_memory().await.unwrap();
        SchemaEngine::new(conn).await.unwrap()
    }

    fn spec(name: &str, ty: &str) -> FieldSpec {
        FieldSpec::new(name, ty)
    }

    #[tokio::test]
    async fn test_provision_creates_table_and_record() {
        let engine = engine().await;
        let record = engine
            .provision("users", &[spec("email", "string"), spec("age", "number")])
            .await
            .unwrap();

        assert_eq!(
            record.fields,
            vec![
                FieldDef::new("email", FieldType::String),
                FieldDef::new("age", FieldType::Number),
            ]
        );
        let columns = engine.connection().table_columns("users").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "email", "age"]);
    }

    #[tokio::test]
    async fn test_provision_reports_table_and_field_issues_together() {
        let engine = engine().await;
        let err = engine
            .provision("bad name", &[spec("a", "integer")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.issues().len(), 2);
        assert!(!engine.connection().table_exists("a").await.unwrap());
        assert!(engine.list_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provision_existing_live_table() {
        let engine = engine().await;
        engine
            .connection()
            .execute_ddl(r#"CREATE TABLE "legacy" ("id" INTEGER PRIMARY KEY)"#)
            .await
            .unwrap();

        let err = engine
            .provision("legacy", &[spec("a", "string")])
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::AlreadyExists { ref table_name } if table_name == "legacy"));
        assert!(engine.catalog().get_by_name("legacy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_and_leaves_fields() {
        let engine = engine().await;
        let record = engine
            .provision("users", &[spec("bio", "string")])
            .await
            .unwrap();

        let err = engine
            .append_fields(record.id, &[spec("age", "number"), spec("bio", "string")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.issues()[0].index, Some(1));

        assert_eq!(engine.read_schema(record.id).await.unwrap(), record.fields);
        let columns = engine.connection().table_columns("users").await.unwrap();
        assert_eq!(columns.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_everywhere() {
        let engine = engine().await;
        let id = TableId::new(1000);
        let fields = [spec("a", "string")];

        assert_eq!(engine.read_schema(id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.replace_schema(id, &fields).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.append_fields(id, &fields).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.check_consistency(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_replace_not_found_wins_over_validation() {
        let engine = engine().await;
        let err = engine
            .replace_schema(TableId::new(5), &[spec("a", "invalid_type")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_consistency_report() {
        let engine = engine().await;
        let record = engine
            .provision("users", &[spec("email", "string"), spec("active", "boolean")])
            .await
            .unwrap();
        assert!(engine.check_consistency(record.id).await.unwrap().is_consistent());

        engine
            .connection()
            .execute_ddl(r#"ALTER TABLE "users" ADD COLUMN "stray" text"#)
            .await
            .unwrap();
        let report = engine.check_consistency(record.id).await.unwrap();
        assert_eq!(report.extra_columns, ["stray"]);
        assert!(report.missing_columns.is_empty());

        engine
            .connection()
            .execute_ddl(r#"DROP TABLE "users""#)
            .await
            .unwrap();
        let report = engine.check_consistency(record.id).await.unwrap();
        assert!(!report.table_exists);
        assert_eq!(report.missing_columns, ["email", "active"]);
    }
}
