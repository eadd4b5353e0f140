//! Schema diffing properties (spec §4.2, §8 invariant 6): diffing a
//! snapshot against itself always yields an empty diff, regardless of
//! table count or shape, and adding a table is never misreported as a
//! modification.

use nl2sql_engine::models::{diff, Column, SchemaSnapshot, SemanticType, Table};
use proptest::prelude::*;
use std::collections::HashSet;

fn arbitrary_table(name: String, column_count: usize) -> Table {
    let columns = (0..column_count)
        .map(|i| Column {
            name: format!("col_{i}"),
            data_type: SemanticType::Text,
            nullable: i != 0,
            is_pk: i == 0,
            is_fk: false,
            comment: None,
        })
        .collect();
    Table {
        name,
        comment: None,
        columns,
        primary_key: HashSet::from(["col_0".to_string()]),
        foreign_keys: HashSet::new(),
        has_composite_key: false,
        has_composite_fk: false,
    }
}

proptest! {
    #[test]
    fn diffing_a_snapshot_against_itself_is_always_empty(table_count in 0usize..8, column_count in 1usize..6) {
        let tables = (0..table_count).map(|i| arbitrary_table(format!("tbl_{i}"), column_count)).collect();
        let snapshot = SchemaSnapshot { tables };
        let result = diff(&snapshot, &snapshot);
        prop_assert!(result.is_empty());
    }

    #[test]
    fn adding_a_table_is_reported_as_added_not_modified(table_count in 0usize..6) {
        let old_tables: Vec<_> = (0..table_count).map(|i| arbitrary_table(format!("tbl_{i}"), 2)).collect();
        let mut new_tables = old_tables.clone();
        new_tables.push(arbitrary_table("tbl_new".to_string(), 2));

        let old = SchemaSnapshot { tables: old_tables };
        let new = SchemaSnapshot { tables: new_tables };
        let result = diff(&old, &new);

        prop_assert_eq!(result.added_tables, vec!["tbl_new".to_string()]);
        prop_assert!(result.modified_tables.is_empty());
        prop_assert!(result.removed_tables.is_empty());
    }
}
