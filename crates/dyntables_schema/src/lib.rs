//! Dynamic Tables schema engine
//!
//! Clients define relational tables at runtime by name and a list of typed
//! fields. This crate turns those definitions into DDL against the live
//! database and keeps a side catalog (`table_metadata`) describing each
//! table's current fields.
//!
//! # Operations
//!
//! | Operation | Effect |
//! |---|---|
//! | [`SchemaEngine::provision`] | `CREATE TABLE` + new catalog record |
//! | [`SchemaEngine::replace_schema`] | `DROP` + `CREATE` (rows discarded) + fields overwritten |
//! | [`SchemaEngine::append_fields`] | `ALTER TABLE ... ADD COLUMN` + fields appended |
//! | [`SchemaEngine::read_schema`] | catalog lookup only |
//!
//! Field removal, renames and type changes are not supported.
//!
//! # Modules
//!
//! - [`types`]: field types, the physical type mapping, identifiers
//! - [`validate`]: request validation
//! - [`ddl`]: statement builder
//! - [`catalog`]: SQLite-backed table catalog
//! - [`reader`]: read side over the catalog
//! - [`locks`]: per-table mutual exclusion
//! - [`engine`]: the operations above

pub mod catalog;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod locks;
pub mod reader;
pub mod types;
pub mod validate;

pub use catalog::{CatalogError, SchemaCatalog, TableSchemaRecord};
pub use engine::{ConsistencyReport, SchemaEngine, TypeMismatch};
pub use error::{ErrorKind, FieldIssue, SchemaError};
pub use reader::RowReader;
pub use types::{physical_type_name, FieldDef, FieldSpec, FieldType, TableId};
