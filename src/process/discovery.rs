//! Schema-time process discovery (spec §4.11a): scans a `SchemaSnapshot`
//! for structural signals of a business process and combines them into a
//! confidence score, cached per fingerprint with a TTL.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::models::{CategoricalValues, DiscoveredProcess, Fingerprint, SchemaSnapshot, Table};

const EMISSION_THRESHOLD: f64 = 0.4;
const STATUS_NAME_HINTS: &[&str] = &["status", "state", "stage", "step", "phase"];
const TIMESTAMP_SUFFIXES: &[&str] = &["created_at", "updated_at", "_at"];

fn is_status_column_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    STATUS_NAME_HINTS.contains(&lower.as_str())
        || STATUS_NAME_HINTS.iter().any(|hint| lower.ends_with(&format!("_{hint}")))
        || lower.starts_with("current_")
}

/// Status-column signal: a low-cardinality column whose name matches a
/// status-like pattern (spec §4.11a).
fn status_signal(table: &Table, categorical_values: &CategoricalValues, max_cardinality: usize) -> Option<(String, f64, String)> {
    table.columns.iter().find_map(|column| {
        if !is_status_column_name(&column.name) {
            return None;
        }
        let cardinality = categorical_values.get(&table.name, &column.name).map(|v| v.len());
        match cardinality {
            Some(n) if n <= max_cardinality => {
                Some((column.name.clone(), 0.35, format!("column `{}` matches a status pattern with {n} distinct values", column.name)))
            },
            None => Some((column.name.clone(), 0.2, format!("column `{}` matches a status pattern", column.name))),
            Some(_) => None,
        }
    })
}

/// Transition-column signal: a `from_X`/`to_X` column pair on the same
/// table (spec §4.11a).
fn transition_signal(table: &Table) -> Option<((String, String), f64, String)> {
    for column in &table.columns {
        let Some(suffix) = column.name.to_lowercase().strip_prefix("from_").map(str::to_string) else { continue };
        let to_name = format!("to_{suffix}");
        if let Some(to_column) = table.columns.iter().find(|c| c.name.to_lowercase() == to_name) {
            return Some((
                (column.name.clone(), to_column.name.clone()),
                0.4,
                format!("columns `{}`/`{}` form a transition pair", column.name, to_column.name),
            ));
        }
    }
    None
}

/// Co-located timestamp signal: `created_at`/`updated_at`/`*_at` columns
/// alongside a detected status column (spec §4.11a).
fn timestamp_signal(table: &Table) -> Option<(f64, String)> {
    let hits: Vec<&str> = table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| TIMESTAMP_SUFFIXES.iter().any(|suffix| name.to_lowercase().ends_with(suffix)))
        .collect();
    if hits.is_empty() {
        None
    } else {
        Some((0.15, format!("co-located timestamp columns: {}", hits.join(", "))))
    }
}

/// FK-chain signal: does `table` participate in a directed chain A→B→C
/// over the foreign-key relation (spec §4.11a)?
fn fk_chain_signal(schema: &SchemaSnapshot, table: &Table) -> Option<(f64, String)> {
    for fk in &table.foreign_keys {
        let Some(middle) = schema.table(&fk.ref_table) else { continue };
        if middle.foreign_keys.iter().any(|next| next.ref_table != table.name) {
            let next_table = middle.foreign_keys.iter().find(|next| next.ref_table != table.name).unwrap();
            return Some((0.2, format!("FK chain {} -> {} -> {}", table.name, middle.name, next_table.ref_table)));
        }
    }
    None
}

fn humanize(table_name: &str) -> String {
    table_name
        .trim_end_matches('s')
        .split(['_', '-'])
        .filter(|s| !s.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scans every table in `schema` and emits a `DiscoveredProcess` for each
/// one whose combined signal confidence reaches the emission threshold.
pub fn discover(schema: &SchemaSnapshot, categorical_values: &CategoricalValues, max_cardinality: usize) -> Vec<DiscoveredProcess> {
    let mut discovered = Vec::new();

    for table in &schema.tables {
        let mut confidence = 0.0;
        let mut evidence = Vec::new();
        let mut status_column = None;
        let mut transition_pattern = None;

        if let Some((column, score, note)) = status_signal(table, categorical_values, max_cardinality) {
            confidence += score;
            evidence.push(note);
            status_column = Some(column);
        }
        if let Some((pattern, score, note)) = transition_signal(table) {
            confidence += score;
            evidence.push(note);
            transition_pattern = Some(pattern);
        }
        if status_column.is_some() {
            if let Some((score, note)) = timestamp_signal(table) {
                confidence += score;
                evidence.push(note);
            }
        }
        if let Some((score, note)) = fk_chain_signal(schema, table) {
            confidence += score;
            evidence.push(note);
        }

        if confidence >= EMISSION_THRESHOLD {
            discovered.push(DiscoveredProcess {
                name: humanize(&table.name),
                main_table: table.name.clone(),
                history_table: None,
                status_column,
                transition_pattern,
                evidence,
                confidence,
            });
        }
    }

    discovered
}

/// Per-fingerprint TTL cache over discovery results (spec §5: lock-free
/// reads, single-mutex writer, immediate invalidation on schema diff).
pub struct DiscoveryCache {
    entries: DashMap<Fingerprint, (Instant, Vec<DiscoveredProcess>)>,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn get(&self, fingerprint: Fingerprint) -> Option<Vec<DiscoveredProcess>> {
        let entry = self.entries.get(&fingerprint)?;
        let (stored_at, processes) = entry.value();
        if stored_at.elapsed() > self.ttl {
            None
        } else {
            Some(processes.clone())
        }
    }

    pub fn put(&self, fingerprint: Fingerprint, processes: Vec<DiscoveredProcess>) {
        self.entries.insert(fingerprint, (Instant::now(), processes));
    }

    pub fn invalidate(&self, fingerprint: Fingerprint) {
        self.entries.remove(&fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, ForeignKey, SemanticType};
    use std::collections::HashSet;

    fn column(name: &str) -> Column {
        Column { name: name.to_string(), data_type: SemanticType::Text, nullable: true, is_pk: false, is_fk: false, comment: None }
    }

    fn table_with(name: &str, columns: Vec<Column>, foreign_keys: HashSet<ForeignKey>) -> Table {
        Table {
            name: name.to_string(),
            comment: None,
            columns,
            primary_key: HashSet::new(),
            foreign_keys,
            has_composite_key: false,
            has_composite_fk: false,
        }
    }

    #[test]
    fn emits_process_for_status_and_transition_columns() {
        let orders = table_with(
            "orders",
            vec![column("id"), column("status"), column("from_status"), column("to_status"), column("updated_at")],
            HashSet::new(),
        );
        let schema = SchemaSnapshot { tables: vec![orders] };

        let mut categorical_values = CategoricalValues::default();
        categorical_values.values.insert(("orders".to_string(), "status".to_string()), HashSet::from(["open".to_string(), "closed".to_string()]));

        let discovered = discover(&schema, &categorical_values, 30);
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].main_table, "orders");
        assert!(discovered[0].confidence >= 0.4);
    }

    #[test]
    fn plain_lookup_table_is_not_discovered() {
        let regions = table_with("regions", vec![column("id"), column("name")], HashSet::new());
        let schema = SchemaSnapshot { tables: vec![regions] };
        let discovered = discover(&schema, &CategoricalValues::default(), 30);
        assert!(discovered.is_empty());
    }

    #[test]
    fn cache_expires_entries_past_ttl() {
        let cache = DiscoveryCache::new(Duration::from_millis(0));
        let fingerprint = crate::models::ConnectionConfig {
            dialect: crate::models::Dialect::Postgres,
            host: "db".to_string(),
            port: 5432,
            database: "sales".to_string(),
            schema: None,
            credentials: crate::models::Credentials { user: "analyst".to_string(), password: "x".to_string() },
        }
        .fingerprint();
        cache.put(fingerprint, vec![]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(fingerprint).is_none());
    }
}
