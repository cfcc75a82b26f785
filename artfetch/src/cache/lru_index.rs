//! Cost-accounted LRU index shared by both cache tiers.
//!
//! The index keeps a recency order alongside the stored values so that the
//! least-recently-used entry can be found in `O(log n)`. It is not
//! synchronised; each tier wraps it in its own lock.
//!
//! # Ordering
//!
//! Every insert or access stamps the entry with a monotonically increasing
//! tick. The `order` map is keyed by tick, so its first element is always
//! the least-recently-used entry.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    cost: u64,
    tick: u64,
}

/// LRU index with per-entry cost accounting.
#[derive(Debug)]
pub(crate) struct LruIndex<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
    total_cost: u64,
}

impl<K, V> LruIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty index.
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            total_cost: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Insert or replace an entry, marking it most recently used.
    ///
    /// Returns the replaced value, if any.
    pub(crate) fn insert(&mut self, key: K, value: V, cost: u64) -> Option<V> {
        let previous = self.remove(&key).map(|(value, _)| value);
        let tick = self.tick();
        self.order.insert(tick, key.clone());
        self.entries.insert(key, Slot { value, cost, tick });
        self.total_cost += cost;
        previous
    }

    /// Look up an entry and mark it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.tick();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        self.order.insert(tick, key.clone());
        Some(&slot.value)
    }

    /// Look up an entry without touching its recency.
    pub(crate) fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Returns true if the key is present.
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry, returning its value and cost.
    pub(crate) fn remove(&mut self, key: &K) -> Option<(V, u64)> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        self.total_cost -= slot.cost;
        Some((slot.value, slot.cost))
    }

    /// Remove and return the least-recently-used entry.
    pub(crate) fn pop_oldest(&mut self) -> Option<(K, V, u64)> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.entries.remove(&key)?;
        self.total_cost -= slot.cost;
        Some((key, slot.value, slot.cost))
    }

    /// Sum of the costs of all entries.
    pub(crate) fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Number of entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over the stored values in arbitrary order.
    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|slot| &slot.value)
    }

    /// Drop every entry.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_cost = 0;
    }
}

impl<K, V> Default for LruIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_tracks_cost() {
        let mut index = LruIndex::new();
        index.insert("a", 1, 100);
        index.insert("b", 2, 50);

        assert_eq!(index.len(), 2);
        assert_eq!(index.total_cost(), 150);
    }

    #[test]
    fn test_replace_adjusts_cost() {
        let mut index = LruIndex::new();
        index.insert("a", 1, 100);
        let previous = index.insert("a", 2, 30);

        assert_eq!(previous, Some(1));
        assert_eq!(index.len(), 1);
        assert_eq!(index.total_cost(), 30);
        assert_eq!(index.peek(&"a"), Some(&2));
    }

    #[test]
    fn test_pop_oldest_follows_insertion_order() {
        let mut index = LruIndex::new();
        index.insert("a", (), 1);
        index.insert("b", (), 1);
        index.insert("c", (), 1);

        assert_eq!(index.pop_oldest().map(|(k, _, _)| k), Some("a"));
        assert_eq!(index.pop_oldest().map(|(k, _, _)| k), Some("b"));
        assert_eq!(index.total_cost(), 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut index = LruIndex::new();
        index.insert("a", (), 1);
        index.insert("b", (), 1);

        assert!(index.get(&"a").is_some());

        assert_eq!(index.pop_oldest().map(|(k, _, _)| k), Some("b"));
        assert_eq!(index.pop_oldest().map(|(k, _, _)| k), Some("a"));
        assert!(index.pop_oldest().is_none());
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut index = LruIndex::new();
        index.insert("a", (), 1);
        index.insert("b", (), 1);

        assert!(index.peek(&"a").is_some());

        assert_eq!(index.pop_oldest().map(|(k, _, _)| k), Some("a"));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut index = LruIndex::new();
        index.insert("a", (), 10);
        index.insert("b", (), 20);

        assert_eq!(index.remove(&"a").map(|(_, cost)| cost), Some(10));
        assert!(!index.contains(&"a"));
        assert_eq!(index.total_cost(), 20);

        index.clear();
        assert_eq!(index.len(), 0);
        assert_eq!(index.total_cost(), 0);
        assert!(index.pop_oldest().is_none());
    }
}
