//! Integration coverage over the four-layer validator (spec §4.7, §8).

use nl2sql_engine::dialect;
use nl2sql_engine::models::Dialect;
use nl2sql_engine::validator::validate;
use proptest::prelude::*;

#[test]
fn rejects_statements_with_side_effects() {
    let profile = dialect::for_dialect(Dialect::Postgres);
    for sql in ["DELETE FROM orders", "DROP TABLE orders", "UPDATE orders SET total = 0", "INSERT INTO orders VALUES (1)"] {
        assert!(validate(sql, profile.as_ref()).is_err(), "expected rejection for: {sql}");
    }
}

#[test]
fn accepts_a_plain_select() {
    let profile = dialect::for_dialect(Dialect::Postgres);
    assert!(validate("SELECT id, total FROM orders WHERE total > 100", profile.as_ref()).is_ok());
}

#[test]
fn oracle_profile_rewrites_bind_variables_before_validation() {
    // The generator rewrites bind markers to string literals (spec §4.6
    // step 5) before a candidate ever reaches the validator.
    let profile = dialect::for_dialect(Dialect::Oracle);
    let rewritten = profile.rewrite_bind_variables("SELECT * FROM orders WHERE region = :region");
    assert!(!rewritten.contains(':'));
    assert!(validate(&rewritten, profile.as_ref()).is_ok());
}

proptest! {
    /// Any read-only SELECT over a single known table clears every layer
    /// (spec §8: the validator must never reject a well-formed read).
    #[test]
    fn accepts_well_formed_selects(column in "[a-z]{1,8}", table in "[a-z]{1,8}", limit in 1u32..500) {
        // Prefixed so the generated identifier can never collide with a
        // SQL reserved word (e.g. "order", "group", "from").
        let profile = dialect::for_dialect(Dialect::Postgres);
        let sql = format!("SELECT col_{column} FROM tbl_{table} LIMIT {limit}");
        prop_assert!(validate(&sql, profile.as_ref()).is_ok());
    }

    /// Statements containing a banned keyword are rejected regardless of
    /// surrounding well-formed SQL (spec §4.7 layer 1).
    #[test]
    fn rejects_any_select_with_an_embedded_drop(table in "[a-z]{1,8}") {
        let profile = dialect::for_dialect(Dialect::Postgres);
        let sql = format!("SELECT * FROM tbl_{table}; DROP TABLE tbl_{table}");
        prop_assert!(validate(&sql, profile.as_ref()).is_err());
    }
}
