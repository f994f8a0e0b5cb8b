//! # Value-Keyed B-Tree
//!
//! Classic B-tree of configurable order keyed on [`Value`] with the shared
//! total order. Nodes live in an id-keyed map; insertion is top-down with an
//! eager root split, so no path ever has to back up after descending.
//!
//! ## Duplicate keys
//!
//! The tree orders entries by key only and places a new entry after the last
//! existing entry with an equal or smaller key. Since sequences are assigned
//! in ingest order, duplicates of one key always sit in `(key, sequence)`
//! order, and an in-order walk of the equal-key range returns them in
//! insertion order. `search_all` and `range_search` share that walk so
//! duplicate runs spanning a pushed-up separator are never missed.
//!
//! ## Fast paths
//!
//! Integer point lookups dominate the query mix, so `search_first_int64`
//! binary-searches each visited node on widened i64 keys and only falls back
//! to the generic comparator for non-integer entries (Null keys in a dense
//! index, mixed-type columns). `search_first_str` does the same for string
//! keys. Both return the record identity without cloning the key.

use eyre::Result;
use hashbrown::HashMap;
use std::cmp::Ordering;

use super::IndexEntry;
use crate::error::EngineError;
use crate::types::{compare_values, try_int64, Value, ValueType};

pub const DEFAULT_ORDER: usize = 32;
pub const MIN_ORDER: usize = 4;
pub const MAX_ORDER: usize = 64;

#[derive(Debug, Default)]
struct Node {
    is_leaf: bool,
    entries: Vec<IndexEntry>,
    children: Vec<u64>,
}

pub struct BTreeIndex {
    key_type: ValueType,
    order: usize,
    root: u64,
    next_node_id: u64,
    nodes: HashMap<u64, Node>,
    entry_count: u64,
}

impl BTreeIndex {
    pub fn new(key_type: ValueType) -> Self {
        Self::with_order(key_type, DEFAULT_ORDER)
    }

    /// Order is the maximum child count per node, clamped to [4, 64].
    pub fn with_order(key_type: ValueType, order: usize) -> Self {
        let mut index = Self {
            key_type,
            order: order.clamp(MIN_ORDER, MAX_ORDER),
            root: 0,
            next_node_id: 1,
            nodes: HashMap::new(),
            entry_count: 0,
        };
        index.root = index.create_node(true);
        index
    }

    pub fn key_type(&self) -> ValueType {
        self.key_type
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_node_id = 1;
        self.entry_count = 0;
        self.root = self.create_node(true);
    }

    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node_id = self.root;
        while let Some(node) = self.nodes.get(&node_id) {
            if node.is_leaf {
                break;
            }
            height += 1;
            node_id = node.children[0];
        }
        height
    }

    fn create_node(&mut self, is_leaf: bool) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            Node {
                is_leaf,
                entries: Vec::new(),
                children: Vec::new(),
            },
        );
        id
    }

    fn node(&self, id: u64) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::Internal(format!("index node {} missing", id)).into())
    }

    fn node_mut(&mut self, id: u64) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| EngineError::Internal(format!("index node {} missing", id)).into())
    }

    fn is_full(&self, id: u64) -> Result<bool> {
        Ok(self.node(id)?.entries.len() >= self.order - 1)
    }

    /// Appends an entry, preserving `(key, sequence)` order for duplicates.
    pub fn insert(
        &mut self,
        key: Value<'static>,
        data_offset: u64,
        data_length: u32,
        sequence: u64,
    ) -> Result<()> {
        let entry = IndexEntry {
            key,
            data_offset,
            data_length,
            sequence,
        };

        if self.is_full(self.root)? {
            let old_root = self.root;
            let new_root = self.create_node(false);
            self.node_mut(new_root)?.children.push(old_root);
            self.split_child(new_root, 0)?;
            self.root = new_root;
        }

        self.insert_non_full(self.root, entry)?;
        self.entry_count += 1;
        Ok(())
    }

    fn insert_non_full(&mut self, node_id: u64, entry: IndexEntry) -> Result<()> {
        let (is_leaf, slot, child_id) = {
            let node = self.node(node_id)?;
            let mut i = node.entries.len();
            while i > 0 && compare_values(&entry.key, &node.entries[i - 1].key) == Ordering::Less {
                i -= 1;
            }
            let child = if node.is_leaf { 0 } else { node.children[i] };
            (node.is_leaf, i, child)
        };

        if is_leaf {
            self.node_mut(node_id)?.entries.insert(slot, entry);
            return Ok(());
        }

        if self.is_full(child_id)? {
            self.split_child(node_id, slot)?;
            // an equal key descends right of the pushed-up separator so the
            // newest duplicate keeps the largest (key, sequence) position
            let node = self.node(node_id)?;
            let descend = if compare_values(&entry.key, &node.entries[slot].key) == Ordering::Less {
                node.children[slot]
            } else {
                node.children[slot + 1]
            };
            self.insert_non_full(descend, entry)
        } else {
            self.insert_non_full(child_id, entry)
        }
    }

    fn split_child(&mut self, parent_id: u64, child_index: usize) -> Result<()> {
        let child_id = self.node(parent_id)?.children[child_index];
        let mid = (self.order - 1) / 2;

        let (sibling_entries, mid_entry, sibling_children, is_leaf) = {
            let child = self.node_mut(child_id)?;
            let sibling_entries = child.entries.split_off(mid + 1);
            let mid_entry = child
                .entries
                .pop()
                .ok_or_else(|| EngineError::Internal("split of underfull node".into()))?;
            let sibling_children = if child.is_leaf {
                Vec::new()
            } else {
                child.children.split_off(mid + 1)
            };
            (sibling_entries, mid_entry, sibling_children, child.is_leaf)
        };

        let sibling_id = self.create_node(is_leaf);
        {
            let sibling = self.node_mut(sibling_id)?;
            sibling.entries = sibling_entries;
            sibling.children = sibling_children;
        }

        let parent = self.node_mut(parent_id)?;
        parent.entries.insert(child_index, mid_entry);
        parent.children.insert(child_index + 1, sibling_id);
        Ok(())
    }

    /// All entries matching `key`, in `(key, sequence)` order.
    pub fn search_all(&self, key: &Value) -> Result<Vec<IndexEntry>> {
        self.range_search(Some(key), Some(key))
    }

    /// Leftmost entry matching `key`, i.e. the one with the smallest
    /// sequence. Fast path for unique keys.
    pub fn search_first(&self, key: &Value) -> Result<Option<IndexEntry>> {
        if let Some(int_key) = try_int64(key) {
            return Ok(self
                .search_first_int64(int_key)?
                .map(|(data_offset, data_length, sequence)| IndexEntry {
                    key: key.to_owned_static(),
                    data_offset,
                    data_length,
                    sequence,
                }));
        }
        self.search_first_in(self.root, key)
    }

    fn search_first_in(&self, node_id: u64, key: &Value) -> Result<Option<IndexEntry>> {
        let node = self.node(node_id)?;
        let slot = lower_bound(&node.entries, |e| compare_values(key, &e.key));

        if !node.is_leaf {
            if let Some(found) = self.search_first_in(node.children[slot], key)? {
                return Ok(Some(found));
            }
        }
        if slot < node.entries.len()
            && compare_values(key, &node.entries[slot].key) == Ordering::Equal
        {
            return Ok(Some(node.entries[slot].clone()));
        }
        Ok(None)
    }

    /// Typed point lookup for integer keys: binary search on widened i64
    /// without constructing a `Value` or dispatching the full comparator.
    /// Returns `(data_offset, data_length, sequence)`.
    pub fn search_first_int64(&self, key: i64) -> Result<Option<(u64, u32, u64)>> {
        self.search_first_int64_in(self.root, key)
    }

    fn search_first_int64_in(&self, node_id: u64, key: i64) -> Result<Option<(u64, u32, u64)>> {
        let node = self.node(node_id)?;
        let slot = lower_bound(&node.entries, |e| match try_int64(&e.key) {
            Some(entry_int) => key.cmp(&entry_int),
            None => compare_values(&Value::Int64(key), &e.key),
        });

        if !node.is_leaf {
            if let Some(found) = self.search_first_int64_in(node.children[slot], key)? {
                return Ok(Some(found));
            }
        }
        if let Some(entry) = node.entries.get(slot) {
            let matches = match try_int64(&entry.key) {
                Some(entry_int) => entry_int == key,
                None => compare_values(&Value::Int64(key), &entry.key) == Ordering::Equal,
            };
            if matches {
                return Ok(Some((entry.data_offset, entry.data_length, entry.sequence)));
            }
        }
        Ok(None)
    }

    /// Typed point lookup for string keys.
    /// Returns `(data_offset, data_length, sequence)`.
    pub fn search_first_str(&self, key: &str) -> Result<Option<(u64, u32, u64)>> {
        self.search_first_str_in(self.root, key)
    }

    fn search_first_str_in(&self, node_id: u64, key: &str) -> Result<Option<(u64, u32, u64)>> {
        let node = self.node(node_id)?;
        let slot = lower_bound(&node.entries, |e| match e.key.as_str() {
            Some(entry_str) => key.as_bytes().cmp(entry_str.as_bytes()),
            None => compare_values(&Value::Str(key.into()), &e.key),
        });

        if !node.is_leaf {
            if let Some(found) = self.search_first_str_in(node.children[slot], key)? {
                return Ok(Some(found));
            }
        }
        if let Some(entry) = node.entries.get(slot) {
            if entry.key.as_str() == Some(key) {
                return Ok(Some((entry.data_offset, entry.data_length, entry.sequence)));
            }
        }
        Ok(None)
    }

    /// Entries with `min <= key <= max` in `(key, sequence)` order. `None`
    /// leaves that side unbounded.
    pub fn range_search(
        &self,
        min: Option<&Value>,
        max: Option<&Value>,
    ) -> Result<Vec<IndexEntry>> {
        let mut results = Vec::new();
        self.collect_range(self.root, min, max, &mut results)?;
        Ok(results)
    }

    fn collect_range(
        &self,
        node_id: u64,
        min: Option<&Value>,
        max: Option<&Value>,
        out: &mut Vec<IndexEntry>,
    ) -> Result<bool> {
        let node = self.node(node_id)?;

        for i in 0..node.entries.len() {
            let entry = &node.entries[i];
            let reaches_min = min.map_or(true, |m| compare_values(&entry.key, m) != Ordering::Less);
            let past_max = max.map_or(false, |m| {
                compare_values(&entry.key, m) == Ordering::Greater
            });

            // the child left of this entry can only matter once its upper
            // bound (this entry's key) reaches the lower bound
            if !node.is_leaf && reaches_min && !self.collect_range(node.children[i], min, max, out)?
            {
                return Ok(false);
            }
            if past_max {
                return Ok(false);
            }
            if reaches_min {
                out.push(entry.clone());
            }
        }

        if !node.is_leaf {
            return self.collect_range(node.children[node.entries.len()], min, max, out);
        }
        Ok(true)
    }

    /// Every entry in `(key, sequence)` order.
    pub fn scan_all(&self) -> Result<Vec<IndexEntry>> {
        let mut results = Vec::with_capacity(self.entry_count as usize);
        self.collect_all(self.root, &mut results)?;
        Ok(results)
    }

    fn collect_all(&self, node_id: u64, out: &mut Vec<IndexEntry>) -> Result<()> {
        let node = self.node(node_id)?;
        for i in 0..node.entries.len() {
            if !node.is_leaf {
                self.collect_all(node.children[i], out)?;
            }
            out.push(node.entries[i].clone());
        }
        if !node.is_leaf {
            self.collect_all(node.children[node.entries.len()], out)?;
        }
        Ok(())
    }
}

/// First index whose entry is not less than the probe, by the supplied
/// comparator `cmp(probe, entry)`.
fn lower_bound(entries: &[IndexEntry], cmp: impl Fn(&IndexEntry) -> Ordering) -> usize {
    let mut lo = 0;
    let mut hi = entries.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cmp(&entries[mid]) == Ordering::Greater {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_index_with(order: usize, keys: &[i64]) -> BTreeIndex {
        let mut index = BTreeIndex::with_order(ValueType::Int64, order);
        for (i, &k) in keys.iter().enumerate() {
            index
                .insert(Value::Int64(k), (i as u64) * 16, 16, i as u64 + 1)
                .unwrap();
        }
        index
    }

    #[test]
    fn point_lookup_finds_single_match() {
        let index = int_index_with(8, &(0..1000).collect::<Vec<_>>());
        let hits = index.search_all(&Value::Int64(500)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sequence, 501);

        assert!(index.search_all(&Value::Int64(99_999)).unwrap().is_empty());
    }

    #[test]
    fn duplicates_spanning_splits_all_surface_in_sequence_order() {
        // 10 distinct keys x 5 inserts each, tiny order forces many splits
        let keys: Vec<i64> = (0..50).map(|i| i % 10).collect();
        let index = int_index_with(4, &keys);

        for key in 0..10i64 {
            let hits = index.search_all(&Value::Int64(key)).unwrap();
            assert_eq!(hits.len(), 5, "key {} SHOULD surface all duplicates", key);
            let sequences: Vec<u64> = hits.iter().map(|e| e.sequence).collect();
            let mut sorted = sequences.clone();
            sorted.sort_unstable();
            assert_eq!(sequences, sorted, "duplicates SHOULD stay in ingest order");
        }
    }

    #[test]
    fn search_first_returns_smallest_sequence_among_duplicates() {
        let keys: Vec<i64> = (0..60).map(|i| i % 3).collect();
        let index = int_index_with(4, &keys);
        for key in 0..3i64 {
            let first = index.search_first(&Value::Int64(key)).unwrap().unwrap();
            let all = index.search_all(&Value::Int64(key)).unwrap();
            assert_eq!(first.sequence, all[0].sequence);
        }
    }

    #[test]
    fn typed_int_fast_path_agrees_with_generic_search() {
        let index = int_index_with(6, &(0..500).rev().collect::<Vec<_>>());
        for key in [0i64, 1, 250, 498, 499] {
            let generic = index.search_first(&Value::Int64(key)).unwrap().unwrap();
            let (offset, length, sequence) = index.search_first_int64(key).unwrap().unwrap();
            assert_eq!((offset, length, sequence), (
                generic.data_offset,
                generic.data_length,
                generic.sequence
            ));
        }
        assert!(index.search_first_int64(1234).unwrap().is_none());
    }

    #[test]
    fn typed_string_fast_path_finds_entries() {
        let mut index = BTreeIndex::with_order(ValueType::String, 4);
        for (i, name) in ["delta", "alpha", "echo", "bravo", "charlie"]
            .iter()
            .enumerate()
        {
            index
                .insert(Value::Str((*name).to_string().into()), i as u64, 8, i as u64 + 1)
                .unwrap();
        }
        let (_, _, sequence) = index.search_first_str("bravo").unwrap().unwrap();
        assert_eq!(sequence, 4);
        assert!(index.search_first_str("zulu").unwrap().is_none());
    }

    #[test]
    fn range_search_is_inclusive_and_ordered() {
        let index = int_index_with(4, &(0..100).collect::<Vec<_>>());
        let hits = index
            .range_search(Some(&Value::Int64(45)), Some(&Value::Int64(55)))
            .unwrap();
        assert_eq!(hits.len(), 11);
        let keys: Vec<i64> = hits.iter().map(|e| try_int64(&e.key).unwrap()).collect();
        assert_eq!(keys, (45..=55).collect::<Vec<_>>());
    }

    #[test]
    fn half_open_ranges_treat_none_as_unbounded() {
        let index = int_index_with(4, &(0..20).collect::<Vec<_>>());
        let upper = index.range_search(Some(&Value::Int64(15)), None).unwrap();
        assert_eq!(upper.len(), 5);
        let lower = index.range_search(None, Some(&Value::Int64(4))).unwrap();
        assert_eq!(lower.len(), 5);
        let all = index.range_search(None, None).unwrap();
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn null_keys_participate_and_sort_first() {
        let mut index = BTreeIndex::with_order(ValueType::Int32, 4);
        index.insert(Value::Int32(1), 0, 8, 1).unwrap();
        index.insert(Value::Null, 16, 8, 2).unwrap();
        index.insert(Value::Int32(0), 32, 8, 3).unwrap();

        let all = index.scan_all().unwrap();
        assert!(all[0].key.is_null());
        assert_eq!(index.search_all(&Value::Null).unwrap().len(), 1);
    }

    #[test]
    fn scan_all_yields_key_order_and_full_count() {
        let keys: Vec<i64> = (0..200).map(|i| (i * 37) % 100).collect();
        let index = int_index_with(5, &keys);
        let all = index.scan_all().unwrap();
        assert_eq!(all.len() as u64, index.entry_count());
        for pair in all.windows(2) {
            assert_ne!(
                compare_values(&pair[0].key, &pair[1].key),
                Ordering::Greater
            );
        }
    }

    #[test]
    fn clear_resets_to_an_empty_tree() {
        let mut index = int_index_with(4, &(0..100).collect::<Vec<_>>());
        assert!(index.height() > 1);
        index.clear();
        assert_eq!(index.entry_count(), 0);
        assert_eq!(index.height(), 1);
        assert!(index.search_all(&Value::Int64(5)).unwrap().is_empty());
    }
}
