//! Row Reader: the read side of a managed table.
//!
//! "Rows" of a managed table are served from the catalog: the reader returns
//! the table's field definitions, not the contents of the live table.

use crate::catalog::SchemaCatalog;
use crate::error::SchemaError;
use crate::types::{FieldDef, TableId};

#[derive(Clone)]
pub struct RowReader {
    catalog: SchemaCatalog,
}

impl RowReader {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Current field list of a table, or `NotFound`.
    pub async fn fields(&self, id: TableId) -> Result<Vec<FieldDef>, SchemaError> {
        self.catalog
            .get(id)
            .await?
            .map(|record| record.fields)
            .ok_or(SchemaError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use dyntables_db::DbConnection;

    #[tokio::test]
    async fn test_fields_of_existing_and_missing_record() {
        let conn = DbConnection::open_memory().await.unwrap();
        let catalog = SchemaCatalog::new(conn).await.unwrap();
        let fields = vec![FieldDef::new("email", FieldType::String)];
        let record = catalog.create("users", &fields).await.unwrap();

        let reader = RowReader::new(catalog);
        assert_eq!(reader.fields(record.id).await.unwrap(), fields);

        let err = reader.fields(TableId::new(999)).await.unwrap_err();
        assert!(matches!(err, SchemaError::NotFound { id } if id == TableId::new(999)));
    }
}
