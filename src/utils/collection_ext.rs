//! Small collection helpers shared across the pipeline components.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Turn a `Vec` into a `HashMap` keyed by `key_fn`.
#[inline]
pub fn vec_to_map<T, K, F>(items: Vec<T>, key_fn: F) -> HashMap<K, T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items.into_iter().map(|item| (key_fn(&item), item)).collect()
}

/// Group items by `key_fn`, preserving relative order within each group.
#[inline]
pub fn group_by<T, K, F>(items: Vec<T>, key_fn: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut map: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        map.entry(key_fn(&item)).or_default().push(item);
    }
    map
}

/// Deduplicate while preserving first-seen order.
#[inline]
pub fn unique_ordered<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Symmetric difference between a current and a new set, split into
/// "added" and "removed" halves. Used by [`crate::schema_mgr::diff`] to
/// compare table/column name sets between two snapshots.
pub fn diff_sets<T: Eq + Hash + Clone>(current: &[T], new_items: &[T]) -> (Vec<T>, Vec<T>) {
    let current_set: HashSet<_> = current.iter().cloned().collect();
    let new_set: HashSet<_> = new_items.iter().cloned().collect();

    let added: Vec<T> = new_set.difference(&current_set).cloned().collect();
    let removed: Vec<T> = current_set.difference(&new_set).cloned().collect();

    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_sets_reports_additions_and_removals() {
        let current = vec![1, 2, 3];
        let updated = vec![2, 3, 4];
        let (added, removed) = diff_sets(&current, &updated);
        assert_eq!(added, vec![4]);
        assert_eq!(removed, vec![1]);
    }

    #[test]
    fn group_by_preserves_order_within_group() {
        let items = vec![("a", 1), ("b", 2), ("a", 3)];
        let grouped = group_by(items, |(k, _)| *k);
        assert_eq!(grouped.get("a"), Some(&vec![("a", 1), ("a", 3)]));
    }

    #[test]
    fn unique_ordered_keeps_first_occurrence() {
        assert_eq!(unique_ordered(vec![1, 2, 1, 3, 2]), vec![1, 2, 3]);
    }
}
