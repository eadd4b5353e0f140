//! SchemaSnapshot and CategoricalValues (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Decimal,
    Text,
    Timestamp,
    Boolean,
    Json,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: SemanticType,
    pub nullable: bool,
    pub is_pk: bool,
    pub is_fk: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    pub primary_key: HashSet<String>,
    pub foreign_keys: HashSet<ForeignKey>,
    /// True when this table's primary key spans more than one column;
    /// `foreign_keys` is always decomposed to single-column entries
    /// (spec §4.2), this flag marks that a decomposition happened.
    pub has_composite_key: bool,
    /// True when at least one of this table's foreign keys is itself
    /// composite (more than one column under the same constraint), even
    /// though each column is still decomposed into its own `ForeignKey`
    /// entry (spec §4.2).
    pub has_composite_fk: bool,
}

impl std::hash::Hash for ForeignKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.column.hash(state);
        self.ref_table.hash(state);
        self.ref_column.hash(state);
    }
}

/// Immutable structural description of a database schema at a point in
/// time. Equality is structural (derived `PartialEq`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<Table>,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// Observed low-cardinality values for a (table, column) pair, captured
/// when cardinality falls below the configured threshold (spec §3, §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoricalValues {
    pub values: HashMap<(String, String), HashSet<String>>,
}

impl CategoricalValues {
    pub fn insert(&mut self, table: &str, column: &str, distinct_values: HashSet<String>) {
        self.values.insert((table.to_string(), column.to_string()), distinct_values);
    }

    pub fn get(&self, table: &str, column: &str) -> Option<&HashSet<String>> {
        self.values.get(&(table.to_string(), column.to_string()))
    }
}

/// What changed between two snapshots (spec §4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub added_tables: Vec<String>,
    pub removed_tables: Vec<String>,
    pub modified_tables: Vec<String>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty() && self.removed_tables.is_empty() && self.modified_tables.is_empty()
    }

    /// Fraction of tables in `new` touched by this diff, used by the
    /// trainer to decide whether a full re-ingest is warranted (spec §4.3:
    /// forced full ingest when >20% of tables changed).
    pub fn changed_fraction(&self, total_tables: usize) -> f64 {
        if total_tables == 0 {
            return 0.0;
        }
        let changed = self.added_tables.len() + self.removed_tables.len() + self.modified_tables.len();
        changed as f64 / total_tables as f64
    }
}

/// Compare two snapshots table-by-table. A table is "modified" if any
/// column's name, type, nullability, or pk/fk flag changed (spec §4.2).
pub fn diff(old: &SchemaSnapshot, new: &SchemaSnapshot) -> SchemaDiff {
    use crate::utils::diff_sets;

    let old_names = old.table_names();
    let new_names = new.table_names();
    let (added_tables, removed_tables) = diff_sets(&old_names, &new_names);

    let mut modified_tables = Vec::new();
    for new_table in &new.tables {
        let Some(old_table) = old.table(&new_table.name) else { continue };
        if old_table != new_table {
            modified_tables.push(new_table.name.clone());
        }
    }
    modified_tables.sort();

    SchemaDiff { added_tables, removed_tables, modified_tables }
}
