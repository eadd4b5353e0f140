//! SchemaManager: structural introspection and diffing (spec §4.2).

#[cfg(feature = "oracle-driver")]
pub mod oracle_introspect;
pub mod postgres_introspect;

#[cfg(feature = "oracle-driver")]
pub use oracle_introspect::OracleSchemaManager;
pub use postgres_introspect::PostgresSchemaManager;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SchemaSnapshot;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("connection lost while introspecting schema: {0}")]
    ConnectionLost(String),
    #[error("permission denied introspecting schema: {0}")]
    PermissionDenied(String),
}

#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// Full structural snapshot of the given schema (or the connection's
    /// default schema when `None`). Fatal on connection/permission failure.
    async fn snapshot(&self, schema_name: Option<&str>) -> Result<SchemaSnapshot, SchemaError>;
}

pub use crate::models::diff;

#[cfg(test)]
mod tests {
    use crate::models::{Column, SchemaDiff, SchemaSnapshot, SemanticType, Table};
    use std::collections::HashSet;

    fn table(name: &str) -> Table {
        Table {
            name: name.to_string(),
            comment: None,
            columns: vec![Column {
                name: "id".into(),
                data_type: SemanticType::Integer,
                nullable: false,
                is_pk: true,
                is_fk: false,
                comment: None,
            }],
            primary_key: HashSet::from(["id".to_string()]),
            foreign_keys: HashSet::new(),
            has_composite_key: false,
            has_composite_fk: false,
        }
    }

    #[test]
    fn re_exported_diff_matches_model_diff() {
        let old = SchemaSnapshot { tables: vec![table("a")] };
        let new = SchemaSnapshot { tables: vec![table("a"), table("b")] };
        let d = super::diff(&old, &new);
        assert_eq!(d, SchemaDiff { added_tables: vec!["b".into()], removed_tables: vec![], modified_tables: vec![] });
    }
}
