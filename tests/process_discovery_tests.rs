//! Process discovery integration coverage (spec §4.11, §8 invariant 4 and
//! property-based topological-layering check): schema-time signal scoring
//! feeding result-time `ProcessFlow` construction through `ProcessDiscovery`.

use std::collections::HashSet;
use std::time::Duration;

use nl2sql_engine::models::{
    CategoricalValues, Column, ColumnDescriptor, Credentials, Dialect, ConnectionConfig, QueryResult, SchemaSnapshot, SemanticType, Table,
};
use nl2sql_engine::process::ProcessDiscovery;
use proptest::prelude::*;

fn connection() -> ConnectionConfig {
    ConnectionConfig {
        dialect: Dialect::Postgres,
        host: "db".to_string(),
        port: 5432,
        database: "sales".to_string(),
        schema: None,
        credentials: Credentials { user: "analyst".to_string(), password: "x".to_string() },
    }
}

fn column(name: &str) -> Column {
    Column { name: name.to_string(), data_type: SemanticType::Text, nullable: true, is_pk: false, is_fk: false, comment: None }
}

fn table(name: &str, columns: Vec<Column>) -> Table {
    Table { name: name.to_string(), comment: None, columns, primary_key: HashSet::new(), foreign_keys: HashSet::new(), has_composite_key: false, has_composite_fk: false }
}

fn descriptor(name: &str, data_type: SemanticType) -> ColumnDescriptor {
    ColumnDescriptor { name: name.to_string(), data_type }
}

fn query_result(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Option<&str>>>) -> QueryResult {
    let rows: Vec<Vec<Option<String>>> = rows.into_iter().map(|r| r.into_iter().map(|v| v.map(str::to_string)).collect()).collect();
    let row_count = rows.len();
    QueryResult { columns, rows, truncated: false, row_count, elapsed: Duration::from_millis(1) }
}

#[tokio::test]
async fn schema_discovery_feeds_the_result_time_flow_name() {
    let discovery = ProcessDiscovery::new(Duration::from_secs(60), 30);
    let fingerprint = connection().fingerprint();

    let orders = table("orders", vec![column("id"), column("status"), column("from_status"), column("to_status"), column("updated_at")]);
    let schema = SchemaSnapshot { tables: vec![orders] };
    let mut categorical_values = CategoricalValues::default();
    categorical_values.values.insert(("orders".to_string(), "status".to_string()), HashSet::from(["open".to_string(), "closed".to_string()]));

    let discovered = discovery.discover_for_schema(fingerprint, &schema, &categorical_values);
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].main_table, "orders");

    let result = query_result(
        vec![descriptor("from", SemanticType::Text), descriptor("to", SemanticType::Text), descriptor("count", SemanticType::Integer)],
        vec![vec![Some("open"), Some("closed"), Some("4")]],
    );
    let flow = discovery.detect(fingerprint, &result).await.expect("a known process plus a transition result must build a flow");
    assert_eq!(flow.name, "Order");
}

#[tokio::test]
async fn invalidating_a_fingerprint_drops_its_cached_discoveries() {
    let discovery = ProcessDiscovery::new(Duration::from_secs(60), 30);
    let fingerprint = connection().fingerprint();

    let orders = table("orders", vec![column("id"), column("status"), column("from_status"), column("to_status")]);
    let schema = SchemaSnapshot { tables: vec![orders] };
    let mut categorical_values = CategoricalValues::default();
    categorical_values.values.insert(("orders".to_string(), "status".to_string()), HashSet::from(["open".to_string(), "closed".to_string()]));
    discovery.discover_for_schema(fingerprint, &schema, &categorical_values);

    discovery.invalidate(fingerprint);

    // A transition-shaped result with no cached discovery still builds a
    // flow (the builder only consults discovery for a name), but with the
    // generic fallback name rather than the table-derived one.
    let result = query_result(
        vec![descriptor("from", SemanticType::Text), descriptor("to", SemanticType::Text), descriptor("count", SemanticType::Integer)],
        vec![vec![Some("open"), Some("closed"), Some("4")]],
    );
    let flow = discovery.detect(fingerprint, &result).await.expect("flow still builds without a cached name");
    assert_eq!(flow.name, "Process");
}

#[tokio::test]
async fn a_shape_with_no_transition_or_aggregate_columns_detects_nothing() {
    let discovery = ProcessDiscovery::new(Duration::from_secs(60), 30);
    let fingerprint = connection().fingerprint();
    let result = query_result(vec![descriptor("region", SemanticType::Text), descriptor("revenue", SemanticType::Decimal)], vec![vec![Some("east"), Some("100")]]);
    assert!(discovery.detect(fingerprint, &result).await.is_none());
}

proptest! {
    /// Any well-formed transition table whose rows only ever advance to a
    /// strictly later stage (no cycles, the shape a discovered business
    /// process actually produces) builds a flow whose edges only reference
    /// nodes present in it, and whose per-node layer never exceeds the
    /// longest chain reachable from a root (spec §8, the process-transition-
    /// table property).
    #[test]
    fn transition_tables_always_satisfy_the_endpoint_and_layering_invariants(
        edge_pairs in prop::collection::vec((0usize..5, 0usize..5), 1..12),
    ) {
        let node_name = |i: usize| format!("n{i}");
        let columns = vec![descriptor("from", SemanticType::Text), descriptor("to", SemanticType::Text)];
        let mut owned_rows: Vec<Vec<Option<String>>> = Vec::new();
        for (a, b) in &edge_pairs {
            let (from, to) = if a <= b { (*a, *b + 1) } else { (*b, *a + 1) };
            owned_rows.push(vec![Some(node_name(from)), Some(node_name(to))]);
        }
        let row_count = owned_rows.len();
        let result = QueryResult { columns, rows: owned_rows, truncated: false, row_count, elapsed: Duration::from_millis(1) };

        let flow = nl2sql_engine::process::builder::build(&result, None);
        if let Some(flow) = flow {
            let ids: HashSet<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
            for edge in &flow.edges {
                prop_assert!(ids.contains(edge.from.as_str()));
                prop_assert!(ids.contains(edge.to.as_str()));
            }
            let max_layer = flow.nodes.iter().map(|n| n.layer).max().unwrap_or(0);
            prop_assert!((max_layer as usize) < flow.nodes.len());
        }
    }
}
