// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A bounded LRU cache mapping request messages to their digests. Entries
//! live in a fixed arena and are linked into a ring through `prev`/`next`
//! indices, so promoting an entry to the head and evicting the tail are
//! both constant-time. Lookup is a linear scan of the live slots; capacity
//! is small and operator-bounded.
//!
//! All operations take the cache mutex. Recency is the time of the last
//! successful `get` or `put`.

use std::sync::Mutex;

struct Entry {
    key: String,
    digest: String,
    prev: usize,
    next: usize,
}

struct Ring {
    // live slots are the prefix `0..len`; slots are claimed in order and
    // reused in place on eviction
    entries: Vec<Entry>,
    head: usize,
    len: usize,
}

/// A thread-safe LRU cache of `key -> digest`, bounded at construction.
pub struct LruCache {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl LruCache {
    /// Create an empty cache with room for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; settings validation rejects that
    /// before construction.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            ring: Mutex::new(Ring {
                entries: Vec::with_capacity(capacity),
                head: 0,
                len: 0,
            }),
            capacity,
        }
    }

    /// Look up `key`. A hit promotes the entry to most-recently-used and
    /// returns a copy of its digest.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut ring = self.ring.lock().unwrap();

        let index = ring.find(key)?;
        ring.promote(index);
        Some(ring.entries[index].digest.clone())
    }

    /// Insert `key -> digest` as the most-recently-used entry. If the key
    /// is already present its digest is replaced (two workers can miss the
    /// same key concurrently; the second put must not duplicate it). If
    /// the cache is full, the least-recently-used entry is overwritten in
    /// place.
    pub fn put(&self, key: &str, digest: String) {
        let mut ring = self.ring.lock().unwrap();

        if let Some(index) = ring.find(key) {
            ring.entries[index].digest = digest;
            ring.promote(index);
            return;
        }

        if ring.len < self.capacity {
            // claim the next unused slot and link it in front of the head
            let index = ring.len;
            ring.entries.push(Entry {
                key: key.to_string(),
                digest,
                prev: index,
                next: index,
            });

            if ring.len > 0 {
                let head = ring.head;
                let tail = ring.entries[head].prev;
                ring.entries[index].next = head;
                ring.entries[index].prev = tail;
                ring.entries[tail].next = index;
                ring.entries[head].prev = index;
            }

            ring.head = index;
            ring.len += 1;
        } else {
            // overwrite the tail; it sits just behind the head in the
            // ring, so becoming the new head needs no re-linking
            let tail = ring.entries[ring.head].prev;
            ring.entries[tail].key = key.to_string();
            ring.entries[tail].digest = digest;
            ring.head = tail;
        }
    }

    /// All live entries in MRU-to-LRU order. Called at shutdown, after the
    /// workers have been joined, for the farewell printout.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let ring = self.ring.lock().unwrap();

        let mut entries = Vec::with_capacity(ring.len);
        let mut index = ring.head;
        for _ in 0..ring.len {
            let entry = &ring.entries[index];
            entries.push((entry.key.clone(), entry.digest.clone()));
            index = entry.next;
        }
        entries
    }

    /// Discard every entry, keeping the configured capacity. Invoked on
    /// the flush signal, from the acceptor loop.
    pub fn clear(&self) {
        let mut ring = self.ring.lock().unwrap();
        ring.entries.clear();
        ring.head = 0;
        ring.len = 0;
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.ring.lock().unwrap().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Ring {
    fn find(&self, key: &str) -> Option<usize> {
        self.entries[..self.len]
            .iter()
            .position(|entry| entry.key == key)
    }

    // splice `index` out of the ring and re-link it as the new head
    fn promote(&mut self, index: usize) {
        if index == self.head {
            return;
        }

        let prev = self.entries[index].prev;
        let next = self.entries[index].next;
        self.entries[prev].next = next;
        self.entries[next].prev = prev;

        let head = self.head;
        let tail = self.entries[head].prev;
        self.entries[index].next = head;
        self.entries[index].prev = tail;
        self.entries[tail].next = index;
        self.entries[head].prev = index;

        self.head = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cache: &LruCache) -> Vec<String> {
        cache.snapshot().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn get_on_empty_misses() {
        let cache = LruCache::new(2);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn put_then_get() {
        let cache = LruCache::new(2);
        cache.put("a", "1".to_string());
        assert_eq!(cache.get("a"), Some("1".to_string()));
    }

    #[test]
    fn len_is_bounded_by_capacity() {
        let cache = LruCache::new(3);
        for i in 0..10 {
            cache.put(&format!("key{}", i), i.to_string());
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn hit_promotes_to_head() {
        let cache = LruCache::new(3);
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        cache.put("c", "3".to_string());
        assert_eq!(keys(&cache), ["c", "b", "a"]);

        assert!(cache.get("a").is_some());
        assert_eq!(keys(&cache), ["a", "c", "b"]);
    }

    #[test]
    fn eviction_removes_exactly_the_tail() {
        let cache = LruCache::new(2);
        cache.put("test2", "2".to_string());
        cache.put("test3", "3".to_string());
        cache.put("test4", "4".to_string());

        // test2 was least recently used and must be gone; the survivors
        // keep their relative order
        assert_eq!(cache.get("test2"), None);
        assert_eq!(keys(&cache), ["test4", "test3"]);
    }

    #[test]
    fn hit_changes_eviction_victim() {
        let cache = LruCache::new(2);
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());

        // touching `a` makes `b` the tail
        assert!(cache.get("a").is_some());
        cache.put("c", "3".to_string());

        assert_eq!(cache.get("b"), None);
        assert_eq!(keys(&cache), ["c", "a"]);
    }

    #[test]
    fn put_existing_key_updates_without_duplicating() {
        let cache = LruCache::new(3);
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        cache.put("a", "9".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("9".to_string()));
        assert_eq!(keys(&cache), ["a", "b"]);
    }

    #[test]
    fn snapshot_is_mru_to_lru() {
        let cache = LruCache::new(4);
        for key in ["w", "x", "y", "z"] {
            cache.put(key, key.to_uppercase());
        }
        assert_eq!(keys(&cache), ["z", "y", "x", "w"]);
    }

    #[test]
    fn clear_empties_and_slots_are_reusable() {
        let cache = LruCache::new(2);
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        cache.put("c", "3".to_string());
        cache.put("d", "4".to_string());
        cache.put("e", "5".to_string());
        assert_eq!(keys(&cache), ["e", "d"]);
    }

    #[test]
    fn single_entry_cache() {
        let cache = LruCache::new(1);
        cache.put("a", "1".to_string());
        cache.put("b", "2".to_string());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some("2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    mod model {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Get(u8),
            Put(u8),
        }

        fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
            proptest::collection::vec(
                prop_oneof![(0u8..12).prop_map(Op::Get), (0u8..12).prop_map(Op::Put)],
                1..200,
            )
        }

        proptest! {
            // drive the cache and a naive Vec model with the same ops and
            // require identical recency order throughout
            #[test]
            fn matches_naive_model(ops in arb_ops(), capacity in 1usize..6) {
                let cache = LruCache::new(capacity);
                // model: MRU first
                let mut model: Vec<(String, String)> = Vec::new();

                for op in ops {
                    match op {
                        Op::Get(k) => {
                            let key = format!("k{}", k);
                            let hit = cache.get(&key);
                            if let Some(pos) = model.iter().position(|(mk, _)| *mk == key) {
                                let entry = model.remove(pos);
                                prop_assert_eq!(hit.as_deref(), Some(entry.1.as_str()));
                                model.insert(0, entry);
                            } else {
                                prop_assert_eq!(hit, None);
                            }
                        }
                        Op::Put(k) => {
                            let key = format!("k{}", k);
                            let digest = format!("d{}", k);
                            cache.put(&key, digest.clone());
                            if let Some(pos) = model.iter().position(|(mk, _)| *mk == key) {
                                model.remove(pos);
                            } else if model.len() == capacity {
                                model.pop();
                            }
                            model.insert(0, (key, digest));
                        }
                    }

                    prop_assert!(cache.len() <= capacity);
                    prop_assert_eq!(cache.snapshot(), model.clone());
                }
            }
        }
    }
}
