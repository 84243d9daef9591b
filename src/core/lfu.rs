//! A small least-frequently-used cache.
//!
//! Each hit bumps the entry's use count; when the cache is full the entry with the lowest
//! count is evicted, ties going to the entry that was touched longest ago.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    uses: u64,
    last_touch: u64,
}

/// Fixed-capacity LFU map.
#[derive(Debug)]
pub struct LfuCache<K, V> {
    capacity: usize,
    clock: u64,
    slots: HashMap<K, Slot<V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LfuCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            clock: 0,
            slots: HashMap::with_capacity(capacity),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Looks up `key`, counting the access.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.tick();
        self.slots.get_mut(key).map(|slot| {
            slot.uses += 1;
            slot.last_touch = now;
            slot.value.clone()
        })
    }

    /// Inserts or overwrites `key`, evicting the least frequently used entry if needed.
    /// Overwriting keeps the existing use count.
    pub fn insert(&mut self, key: K, value: V) {
        let now = self.tick();
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.value = value;
            slot.uses += 1;
            slot.last_touch = now;
            return;
        }

        if self.slots.len() >= self.capacity {
            self.evict();
        }
        self.slots.insert(
            key,
            Slot {
                value,
                uses: 1,
                last_touch: now,
            },
        );
    }

    /// Inserts `value` only when `key` is absent; returns the value now cached.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> V {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        self.insert(key, value.clone());
        value
    }

    /// Drops `key` from the cache.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.slots.remove(key).map(|slot| slot.value)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `key` is cached, without counting an access.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    fn evict(&mut self) {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.uses, slot.last_touch))
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            self.slots.remove(&victim);
        }
    }
}
