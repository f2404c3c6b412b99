//! Indexed entity store.
//!
//! A generational slot collection with attached lookup structures:
//! - **indexes**: unique key → item (e.g. entity id, spatial handle)
//! - **groups**: key → bucket of items (e.g. brand)
//! - **filters**: live sets of items matching a predicate
//!
//! All three are maintained incrementally on every `add`/`delete`, never by
//! rescanning the collection. Keys are computed once at insertion and remembered
//! per item, so key functions must only read fields that never change while the
//! item is stored.
//!
//! Lookups on unknown index/group names or keys return `None`/empty; deleting an
//! absent item is a no-op.

use crate::error::StoreError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Key type shared by indexes and groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Text(String),
    Int(i64),
    Uint(u64),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Text(s) => write!(f, "{s:?}"),
            StoreKey::Int(i) => write!(f, "{i}"),
            StoreKey::Uint(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for StoreKey {
    fn from(value: &str) -> Self {
        StoreKey::Text(value.to_owned())
    }
}

impl From<String> for StoreKey {
    fn from(value: String) -> Self {
        StoreKey::Text(value)
    }
}

impl From<&String> for StoreKey {
    fn from(value: &String) -> Self {
        StoreKey::Text(value.clone())
    }
}

impl From<i64> for StoreKey {
    fn from(value: i64) -> Self {
        StoreKey::Int(value)
    }
}

impl From<u64> for StoreKey {
    fn from(value: u64) -> Self {
        StoreKey::Uint(value)
    }
}

/// Stable reference to a stored item. Stale slots (item deleted) resolve to `None`
/// even if the underlying storage was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    index: u32,
    generation: u32,
}

/// Handle to a live filter created with [`IndexedStore::create_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(usize);

type KeyFn<T> = Box<dyn Fn(&T) -> StoreKey + Send + Sync>;
type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Index<T> {
    name: &'static str,
    key: KeyFn<T>,
    items: HashMap<StoreKey, Slot>,
}

struct Group<T> {
    name: &'static str,
    key: KeyFn<T>,
    buckets: HashMap<StoreKey, Vec<Slot>>,
}

struct Filter<T> {
    predicate: Predicate<T>,
    items: BTreeSet<Slot>,
}

struct Entry<T> {
    item: T,
    index_keys: Vec<StoreKey>,
    group_keys: Vec<StoreKey>,
}

struct SlotEntry<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

pub struct IndexedStore<T> {
    slots: Vec<SlotEntry<T>>,
    free: Vec<u32>,
    len: usize,
    indexes: Vec<Index<T>>,
    groups: Vec<Group<T>>,
    filters: Vec<Filter<T>>,
}

impl<T> Default for IndexedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IndexedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStore")
            .field("len", &self.len)
            .field("indexes", &self.indexes.iter().map(|i| i.name).collect::<Vec<_>>())
            .field("groups", &self.groups.iter().map(|g| g.name).collect::<Vec<_>>())
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl<T> IndexedStore<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            indexes: Vec::new(),
            groups: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Attach a unique index and backfill it from the current items.
    /// On backfill collisions the earlier item keeps the key.
    pub fn add_index<K, F>(&mut self, name: &'static str, key: F) -> &mut Self
    where
        K: Into<StoreKey>,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key: KeyFn<T> = Box::new(move |item| key(item).into());
        let mut items = HashMap::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let generation = slot.generation;
            if let Some(entry) = slot.entry.as_mut() {
                let k = key(&entry.item);
                items.entry(k.clone()).or_insert(Slot { index: index as u32, generation });
                entry.index_keys.push(k);
            }
        }
        self.indexes.push(Index { name, key, items });
        self
    }

    /// Attach a grouping and backfill it from the current items.
    pub fn add_group<K, F>(&mut self, name: &'static str, key: F) -> &mut Self
    where
        K: Into<StoreKey>,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key: KeyFn<T> = Box::new(move |item| key(item).into());
        let mut buckets: HashMap<StoreKey, Vec<Slot>> = HashMap::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let generation = slot.generation;
            if let Some(entry) = slot.entry.as_mut() {
                let k = key(&entry.item);
                buckets.entry(k.clone()).or_default().push(Slot { index: index as u32, generation });
                entry.group_keys.push(k);
            }
        }
        self.groups.push(Group { name, key, buckets });
        self
    }

    /// Register a live filter. The returned id reads the current matches at any time.
    pub fn create_filter<F>(&mut self, predicate: F) -> FilterId
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let items = self
            .iter_slots()
            .filter(|(_, item)| predicate(*item))
            .map(|(slot, _)| slot)
            .collect();
        self.filters.push(Filter {
            predicate: Box::new(predicate),
            items,
        });
        FilterId(self.filters.len() - 1)
    }

    /// Insert an item, updating every index, group and filter.
    pub fn add(&mut self, item: T) -> Result<Slot, StoreError> {
        let index_keys: Vec<StoreKey> = self.indexes.iter().map(|i| (i.key)(&item)).collect();
        for (index, key) in self.indexes.iter().zip(&index_keys) {
            if index.items.contains_key(key) {
                return Err(StoreError::DuplicateKey {
                    index: index.name,
                    key: key.to_string(),
                });
            }
        }
        let group_keys: Vec<StoreKey> = self.groups.iter().map(|g| (g.key)(&item)).collect();

        let slot = match self.free.pop() {
            Some(index) => Slot {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                self.slots.push(SlotEntry { generation: 0, entry: None });
                Slot {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        for (index, key) in self.indexes.iter_mut().zip(&index_keys) {
            index.items.insert(key.clone(), slot);
        }
        for (group, key) in self.groups.iter_mut().zip(&group_keys) {
            group.buckets.entry(key.clone()).or_default().push(slot);
        }
        for filter in &mut self.filters {
            if (filter.predicate)(&item) {
                filter.items.insert(slot);
            }
        }

        self.slots[slot.index as usize].entry = Some(Entry {
            item,
            index_keys,
            group_keys,
        });
        self.len += 1;
        Ok(slot)
    }

    /// Remove an item. Returns `None` when the slot is stale.
    pub fn delete(&mut self, slot: Slot) -> Option<T> {
        let slot_entry = self.slots.get_mut(slot.index as usize)?;
        if slot_entry.generation != slot.generation {
            return None;
        }
        let entry = slot_entry.entry.take()?;
        slot_entry.generation = slot_entry.generation.wrapping_add(1);
        self.free.push(slot.index);
        self.len -= 1;

        for (index, key) in self.indexes.iter_mut().zip(&entry.index_keys) {
            if index.items.get(key) == Some(&slot) {
                index.items.remove(key);
            }
        }
        for (group, key) in self.groups.iter_mut().zip(&entry.group_keys) {
            if let Some(bucket) = group.buckets.get_mut(key) {
                bucket.retain(|s| *s != slot);
                if bucket.is_empty() {
                    group.buckets.remove(key);
                }
            }
        }
        for filter in &mut self.filters {
            filter.items.remove(&slot);
        }
        Some(entry.item)
    }

    pub fn delete_by_index(&mut self, index: &str, key: impl Into<StoreKey>) -> Option<T> {
        let slot = self.slot_by_index(index, key)?;
        self.delete(slot)
    }

    pub fn get(&self, slot: Slot) -> Option<&T> {
        let slot_entry = self.slots.get(slot.index as usize)?;
        if slot_entry.generation != slot.generation {
            return None;
        }
        slot_entry.entry.as_ref().map(|e| &e.item)
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        let slot_entry = self.slots.get_mut(slot.index as usize)?;
        if slot_entry.generation != slot.generation {
            return None;
        }
        slot_entry.entry.as_mut().map(|e| &mut e.item)
    }

    pub fn slot_by_index(&self, index: &str, key: impl Into<StoreKey>) -> Option<Slot> {
        let index = self.indexes.iter().find(|i| i.name == index)?;
        index.items.get(&key.into()).copied()
    }

    pub fn get_by_index(&self, index: &str, key: impl Into<StoreKey>) -> Option<&T> {
        let slot = self.slot_by_index(index, key)?;
        self.get(slot)
    }

    pub fn get_by_index_mut(&mut self, index: &str, key: impl Into<StoreKey>) -> Option<&mut T> {
        let slot = self.slot_by_index(index, key)?;
        self.get_mut(slot)
    }

    pub fn has(&self, index: &str, key: impl Into<StoreKey>) -> bool {
        self.slot_by_index(index, key).is_some()
    }

    /// Slots in a group bucket, in insertion order.
    pub fn group_slots(&self, group: &str, key: impl Into<StoreKey>) -> &[Slot] {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .and_then(|g| g.buckets.get(&key.into()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_by_group(&self, group: &str, key: impl Into<StoreKey>) -> Vec<&T> {
        self.group_slots(group, key).iter().filter_map(|s| self.get(*s)).collect()
    }

    /// Current matches of a live filter, in slot order.
    pub fn filtered(&self, filter: FilterId) -> Vec<Slot> {
        self.filters
            .get(filter.0)
            .map(|f| f.items.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn filtered_items(&self, filter: FilterId) -> impl Iterator<Item = &T> + '_ {
        self.filters
            .get(filter.0)
            .into_iter()
            .flat_map(|f| f.items.iter())
            .filter_map(move |s| self.get(*s))
    }

    /// Every stored item with its slot.
    pub fn iter_slots(&self) -> impl Iterator<Item = (Slot, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|e| {
                (
                    Slot {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &e.item,
                )
            })
        })
    }

    /// Every stored item.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter_slots().map(|(_, item)| item)
    }

    pub fn list(&self) -> Vec<&T> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        kind: &'static str,
        value: i64,
    }

    fn item(id: &str, kind: &'static str, value: i64) -> Item {
        Item {
            id: id.to_string(),
            kind,
            value,
        }
    }

    fn store() -> IndexedStore<Item> {
        let mut store = IndexedStore::new();
        store.add_index("id", |i: &Item| i.id.clone()).add_group("kind", |i: &Item| i.kind);
        store
    }

    #[test]
    fn test_index_lookup_and_delete() {
        let mut store = store();
        store.add(item("a", "x", 1)).unwrap();
        store.add(item("b", "y", 2)).unwrap();

        assert_eq!(store.get_by_index("id", "a").map(|i| i.value), Some(1));
        assert!(store.has("id", "b"));

        let removed = store.delete_by_index("id", "a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(!store.has("id", "a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_lookups_are_empty() {
        let store = store();
        assert!(store.get_by_index("id", "missing").is_none());
        assert!(store.get_by_index("no-such-index", "a").is_none());
        assert!(store.get_by_group("kind", "nope").is_empty());
        assert!(store.get_by_group("no-such-group", "x").is_empty());
        assert!(!store.has("id", "missing"));
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut store = store();
        let slot = store.add(item("a", "x", 1)).unwrap();
        assert!(store.delete(slot).is_some());
        assert!(store.delete(slot).is_none());
        assert!(store.delete_by_index("id", "a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut store = store();
        store.add(item("a", "x", 1)).unwrap();
        let err = store.add(item("a", "y", 2)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { index: "id", .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_group("kind", "y").len(), 0);
    }

    #[test]
    fn test_groups_track_membership() {
        let mut store = store();
        store.add(item("a", "x", 1)).unwrap();
        store.add(item("b", "x", 2)).unwrap();
        store.add(item("c", "y", 3)).unwrap();

        assert_eq!(store.get_by_group("kind", "x").len(), 2);
        store.delete_by_index("id", "a");
        let xs = store.get_by_group("kind", "x");
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].id, "b");
    }

    #[test]
    fn test_add_index_backfills() {
        let mut store = IndexedStore::new();
        store.add(item("a", "x", 10)).unwrap();
        store.add(item("b", "y", 20)).unwrap();
        store.add_index("value", |i: &Item| i.value).add_group("kind", |i: &Item| i.kind);

        assert_eq!(store.get_by_index("value", 20i64).map(|i| i.id.as_str()), Some("b"));
        assert_eq!(store.get_by_group("kind", "x").len(), 1);

        // Keys recorded during backfill are cleaned up on delete.
        store.delete_by_index("value", 10i64);
        assert!(store.get_by_group("kind", "x").is_empty());
    }

    #[test]
    fn test_filter_is_maintained_incrementally() {
        let mut store = store();
        store.add(item("a", "x", 1)).unwrap();
        let big = store.create_filter(|i: &Item| i.value >= 10);
        assert!(store.filtered(big).is_empty());

        store.add(item("b", "x", 15)).unwrap();
        store.add(item("c", "y", 30)).unwrap();
        let ids: Vec<_> = store.filtered_items(big).map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["b".to_string(), "c".to_string()]);

        store.delete_by_index("id", "b");
        assert_eq!(store.filtered(big).len(), 1);
    }

    #[test]
    fn test_stale_slot_after_reuse() {
        let mut store = store();
        let old = store.add(item("a", "x", 1)).unwrap();
        store.delete(old);
        let new = store.add(item("b", "x", 2)).unwrap();
        assert_ne!(old, new);
        assert!(store.get(old).is_none());
        assert_eq!(store.get(new).map(|i| i.value), Some(2));
    }
}
