use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::DialectProfile;
use crate::models::Dialect;

static BIND_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\w+").unwrap());

static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["select", "from", "where", "table", "user", "order", "group", "rownum", "dual"]
        .into_iter()
        .collect()
});

const EXAMPLES: &[(&str, &str)] = &[
    ("how many orders were placed last month", "SELECT count(*) FROM orders WHERE placed_at >= trunc(sysdate, 'MM') - interval '1' month AND placed_at < trunc(sysdate, 'MM')"),
    ("top 5 customers by total spend", "SELECT customer_id, sum(total) AS total_spend FROM orders GROUP BY customer_id ORDER BY total_spend DESC FETCH FIRST 5 ROWS ONLY"),
];

const DOCUMENTATION: &str = "Oracle dialect: double-quoted identifiers (case-sensitive), :name bind variables, FETCH FIRST n ROWS ONLY for pagination, DBMS_/UTL_ packages are reserved for the database and must never appear in generated SQL.";

pub struct OracleProfile;

impl OracleProfile {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OracleProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectProfile for OracleProfile {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn pagination_clause(&self, n: u64) -> String {
        format!("FETCH FIRST {n} ROWS ONLY")
    }

    fn example_queries(&self) -> &[(&'static str, &'static str)] {
        EXAMPLES
    }

    fn bind_variable_shape(&self) -> &Regex {
        &BIND_SHAPE
    }

    fn documentation_blob(&self) -> &str {
        DOCUMENTATION
    }

    fn transpile_target_name(&self) -> &'static str {
        "oracle"
    }

    fn reserved_keywords(&self) -> &HashSet<&'static str> {
        &RESERVED
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
