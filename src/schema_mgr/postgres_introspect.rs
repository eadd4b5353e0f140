use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::{SchemaError, SchemaManager};
use crate::executor::pool::PoolCheckout;
use crate::models::{Column, ForeignKey, SchemaSnapshot, SemanticType, Table};

/// Introspects `information_schema.*` (spec §6), reusing a checked-out
/// connection from the same per-fingerprint pool the executor draws from.
pub struct PostgresSchemaManager {
    client: PoolCheckout,
}

impl PostgresSchemaManager {
    pub fn new(client: PoolCheckout) -> Self {
        Self { client }
    }

    fn map_type(data_type: &str) -> SemanticType {
        match data_type {
            "integer" | "bigint" | "smallint" => SemanticType::Integer,
            "numeric" | "real" | "double precision" => SemanticType::Decimal,
            "boolean" => SemanticType::Boolean,
            "timestamp without time zone" | "timestamp with time zone" | "date" => SemanticType::Timestamp,
            "json" | "jsonb" => SemanticType::Json,
            "bytea" => SemanticType::Binary,
            _ => SemanticType::Text,
        }
    }
}

#[async_trait]
impl SchemaManager for PostgresSchemaManager {
    async fn snapshot(&self, schema_name: Option<&str>) -> Result<SchemaSnapshot, SchemaError> {
        let schema = schema_name.unwrap_or("public");

        let column_rows = self
            .client
            .query(
                "SELECT table_name, column_name, data_type, is_nullable \
                 FROM information_schema.columns WHERE table_schema = $1 \
                 ORDER BY table_name, ordinal_position",
                &[&schema],
            )
            .await
            .map_err(|e| map_error(e))?;

        let pk_rows = self
            .client
            .query(
                "SELECT tc.table_name, kcu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 WHERE tc.table_schema = $1 AND tc.constraint_type = 'PRIMARY KEY'",
                &[&schema],
            )
            .await
            .map_err(|e| map_error(e))?;

        let fk_rows = self
            .client
            .query(
                "SELECT tc.table_name, tc.constraint_name, kcu.column_name, ccu.table_name AS ref_table, ccu.column_name AS ref_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
                 WHERE tc.table_schema = $1 AND tc.constraint_type = 'FOREIGN KEY'",
                &[&schema],
            )
            .await
            .map_err(|e| map_error(e))?;

        let mut pk_by_table: HashMap<String, HashSet<String>> = HashMap::new();
        for row in &pk_rows {
            let table_name: String = row.get(0);
            let column_name: String = row.get(1);
            pk_by_table.entry(table_name).or_default().insert(column_name);
        }

        let mut fk_by_table: HashMap<String, HashSet<ForeignKey>> = HashMap::new();
        let mut fk_column_set: HashMap<String, HashSet<String>> = HashMap::new();
        let mut fk_columns_by_constraint: HashMap<(String, String), HashSet<String>> = HashMap::new();
        for row in &fk_rows {
            let table_name: String = row.get(0);
            let constraint_name: String = row.get(1);
            let column: String = row.get(2);
            let ref_table: String = row.get(3);
            let ref_column: String = row.get(4);
            fk_column_set.entry(table_name.clone()).or_default().insert(column.clone());
            fk_columns_by_constraint.entry((table_name.clone(), constraint_name)).or_default().insert(column.clone());
            fk_by_table.entry(table_name).or_default().insert(ForeignKey { column, ref_table, ref_column });
        }

        let mut composite_fk_tables: HashSet<String> = HashSet::new();
        for ((table_name, _constraint_name), columns) in &fk_columns_by_constraint {
            if columns.len() > 1 {
                composite_fk_tables.insert(table_name.clone());
            }
        }

        let mut columns_by_table: HashMap<String, Vec<Column>> = HashMap::new();
        let mut table_order: Vec<String> = Vec::new();
        for row in &column_rows {
            let table_name: String = row.get(0);
            let column_name: String = row.get(1);
            let data_type: String = row.get(2);
            let is_nullable: String = row.get(3);

            if !columns_by_table.contains_key(&table_name) {
                table_order.push(table_name.clone());
            }

            let is_pk = pk_by_table.get(&table_name).is_some_and(|pks| pks.contains(&column_name));
            let is_fk = fk_column_set.get(&table_name).is_some_and(|fks| fks.contains(&column_name));

            columns_by_table.entry(table_name).or_default().push(Column {
                name: column_name,
                data_type: Self::map_type(&data_type),
                nullable: is_nullable == "YES",
                is_pk,
                is_fk,
                comment: None,
            });
        }

        let tables = table_order
            .into_iter()
            .map(|name| {
                let primary_key = pk_by_table.remove(&name).unwrap_or_default();
                let foreign_keys = fk_by_table.remove(&name).unwrap_or_default();
                let has_composite_key = primary_key.len() > 1;
                let has_composite_fk = composite_fk_tables.contains(&name);
                Table {
                    columns: columns_by_table.remove(&name).unwrap_or_default(),
                    has_composite_key,
                    has_composite_fk,
                    primary_key,
                    foreign_keys,
                    comment: None,
                    name,
                }
            })
            .collect();

        Ok(SchemaSnapshot { tables })
    }
}

fn map_error(err: tokio_postgres::Error) -> SchemaError {
    if let Some(db_error) = err.as_db_error() {
        if db_error.code() == &tokio_postgres::error::SqlState::INSUFFICIENT_PRIVILEGE {
            return SchemaError::PermissionDenied(db_error.message().to_string());
        }
    }
    SchemaError::ConnectionLost(err.to_string())
}
