//! Introspects `ALL_TABLES`/`ALL_TAB_COLUMNS`/`ALL_CONSTRAINTS`/
//! `ALL_CONS_COLUMNS` (spec §6). Compiled only with the `oracle-driver`
//! feature, since it needs OCI client libraries at link time.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::{SchemaError, SchemaManager};
use crate::models::{Column, ForeignKey, SchemaSnapshot, SemanticType, Table};

pub struct OracleSchemaManager {
    connection: std::sync::Arc<std::sync::Mutex<oracle::Connection>>,
}

impl OracleSchemaManager {
    pub fn new(connection: std::sync::Arc<std::sync::Mutex<oracle::Connection>>) -> Self {
        Self { connection }
    }

    fn map_type(data_type: &str) -> SemanticType {
        match data_type {
            "NUMBER" | "INTEGER" | "FLOAT" => SemanticType::Decimal,
            "VARCHAR2" | "CHAR" | "CLOB" | "NVARCHAR2" => SemanticType::Text,
            "DATE" | "TIMESTAMP" => SemanticType::Timestamp,
            "BLOB" | "RAW" => SemanticType::Binary,
            _ => SemanticType::Text,
        }
    }

    /// Runs the synchronous OCI introspection calls off the async runtime
    /// via `spawn_blocking`; the connection's own mutex keeps concurrent
    /// callers from sharing one OCI session at once.
    fn snapshot_blocking(connection: &std::sync::Mutex<oracle::Connection>, owner: &str) -> Result<SchemaSnapshot, SchemaError> {
        let connection = connection.lock().unwrap_or_else(|e| e.into_inner());

        let column_rows = connection
            .query(
                "SELECT table_name, column_name, data_type, nullable FROM all_tab_columns \
                 WHERE owner = :owner ORDER BY table_name, column_id",
                &[&owner],
            )
            .map_err(map_error)?;

        let mut table_order: Vec<String> = Vec::new();
        let mut columns_by_table: HashMap<String, Vec<Column>> = HashMap::new();
        for row in column_rows {
            let row = row.map_err(map_error)?;
            let table_name: String = row.get("table_name").map_err(map_error)?;
            let column_name: String = row.get("column_name").map_err(map_error)?;
            let data_type: String = row.get("data_type").map_err(map_error)?;
            let nullable: String = row.get("nullable").map_err(map_error)?;

            if !columns_by_table.contains_key(&table_name) {
                table_order.push(table_name.clone());
            }
            columns_by_table.entry(table_name).or_default().push(Column {
                name: column_name,
                data_type: Self::map_type(&data_type),
                nullable: nullable == "Y",
                is_pk: false,
                is_fk: false,
                comment: None,
            });
        }

        let constraint_rows = connection
            .query(
                "SELECT ac.table_name, ac.constraint_name, ac.constraint_type, acc.column_name, \
                        r_ac.table_name AS ref_table, r_acc.column_name AS ref_column \
                 FROM all_constraints ac \
                 JOIN all_cons_columns acc ON ac.constraint_name = acc.constraint_name AND ac.owner = acc.owner \
                 LEFT JOIN all_constraints r_ac ON ac.r_constraint_name = r_ac.constraint_name AND ac.r_owner = r_ac.owner \
                 LEFT JOIN all_cons_columns r_acc ON r_ac.constraint_name = r_acc.constraint_name AND r_ac.owner = r_acc.owner \
                 WHERE ac.owner = :owner AND ac.constraint_type IN ('P', 'R')",
                &[&owner],
            )
            .map_err(map_error)?;

        let mut pk_by_table: HashMap<String, HashSet<String>> = HashMap::new();
        let mut fk_by_table: HashMap<String, HashSet<ForeignKey>> = HashMap::new();
        let mut fk_columns_by_constraint: HashMap<(String, String), HashSet<String>> = HashMap::new();
        for row in constraint_rows {
            let row = row.map_err(map_error)?;
            let table_name: String = row.get("table_name").map_err(map_error)?;
            let constraint_name: String = row.get("constraint_name").map_err(map_error)?;
            let constraint_type: String = row.get("constraint_type").map_err(map_error)?;
            let column_name: String = row.get("column_name").map_err(map_error)?;

            if constraint_type == "P" {
                pk_by_table.entry(table_name).or_default().insert(column_name);
            } else {
                let ref_table: Option<String> = row.get("ref_table").map_err(map_error)?;
                let ref_column: Option<String> = row.get("ref_column").map_err(map_error)?;
                if let (Some(ref_table), Some(ref_column)) = (ref_table, ref_column) {
                    fk_columns_by_constraint
                        .entry((table_name.clone(), constraint_name))
                        .or_default()
                        .insert(column_name.clone());
                    fk_by_table.entry(table_name).or_default().insert(ForeignKey {
                        column: column_name,
                        ref_table,
                        ref_column,
                    });
                }
            }
        }

        let mut composite_fk_tables: HashSet<String> = HashSet::new();
        for ((table_name, _constraint_name), columns) in &fk_columns_by_constraint {
            if columns.len() > 1 {
                composite_fk_tables.insert(table_name.clone());
            }
        }

        let tables = table_order
            .into_iter()
            .map(|name| {
                let primary_key = pk_by_table.remove(&name).unwrap_or_default();
                let foreign_keys = fk_by_table.remove(&name).unwrap_or_default();
                let fk_columns: HashSet<String> = foreign_keys.iter().map(|fk| fk.column.clone()).collect();
                let has_composite_key = primary_key.len() > 1;
                let has_composite_fk = composite_fk_tables.contains(&name);
                let mut columns = columns_by_table.remove(&name).unwrap_or_default();
                for column in &mut columns {
                    column.is_pk = primary_key.contains(&column.name);
                    column.is_fk = fk_columns.contains(&column.name);
                }
                Table { columns, has_composite_key, has_composite_fk, primary_key, foreign_keys, comment: None, name }
            })
            .collect();

        Ok(SchemaSnapshot { tables })
    }
}

#[async_trait]
impl SchemaManager for OracleSchemaManager {
    async fn snapshot(&self, schema_name: Option<&str>) -> Result<SchemaSnapshot, SchemaError> {
        let connection = self.connection.clone();
        let owner = schema_name.map(str::to_uppercase).unwrap_or_else(|| "USER".to_string());

        tokio::task::spawn_blocking(move || Self::snapshot_blocking(&connection, &owner))
            .await
            .map_err(|e| SchemaError::ConnectionLost(e.to_string()))?
    }
}

fn map_error(err: oracle::Error) -> SchemaError {
    match &err {
        oracle::Error::OciError(oci) if oci.code() == 1017 || oci.code() == 1031 => {
            SchemaError::PermissionDenied(err.to_string())
        },
        _ => SchemaError::ConnectionLost(err.to_string()),
    }
}
