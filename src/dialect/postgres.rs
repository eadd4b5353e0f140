use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::DialectProfile;
use crate::models::Dialect;

static BIND_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\d+").unwrap());

static RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["select", "from", "where", "table", "user", "order", "group", "limit", "offset"]
        .into_iter()
        .collect()
});

const EXAMPLES: &[(&str, &str)] = &[
    ("how many orders were placed last month", "SELECT count(*) FROM orders WHERE placed_at >= date_trunc('month', now()) - interval '1 month' AND placed_at < date_trunc('month', now())"),
    ("top 5 customers by total spend", "SELECT customer_id, sum(total) AS total_spend FROM orders GROUP BY customer_id ORDER BY total_spend DESC LIMIT 5"),
];

const DOCUMENTATION: &str = "PostgreSQL dialect: double-quoted identifiers, $n positional bind parameters, LIMIT/OFFSET for pagination, ILIKE for case-insensitive matching.";

pub struct PostgresProfile;

impl PostgresProfile {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostgresProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectProfile for PostgresProfile {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn pagination_clause(&self, n: u64) -> String {
        format!("LIMIT {n}")
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
        "postgres"
    }

    fn reserved_keywords(&self) -> &HashSet<&'static str> {
        &RESERVED
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clause_uses_limit() {
        assert_eq!(PostgresProfile::new().pagination_clause(10), "LIMIT 10");
    }

    #[test]
    fn quote_identifier_doubles_embedded_quotes() {
        assert_eq!(PostgresProfile::new().quote_identifier("wei\"rd"), "\"wei\"\"rd\"");
    }
}
