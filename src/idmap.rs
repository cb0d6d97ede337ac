//! Open-chained hash table mapping caller ids (`u64`) to opaque references.
//!
//! Grounded on the same "bucket of chains, rehash past a load factor" shape
//! as a textbook hash table rather than reaching for `std::collections::HashMap`
//! directly, since the facade (§4.G) needs `remove`/`purge`/explicit rehash
//! control as first-class operations rather than `HashMap`'s entry API.

const DEFAULT_BUCKET_COUNT: usize = 16;
const LOAD_FACTOR_THRESHOLD: usize = 15;

/// Maps `u64` ids to an opaque reference `V` (here, an arena index).
#[derive(Debug, Clone)]
pub struct IdMap<V> {
    buckets: Vec<Vec<(u64, V)>>,
    len: usize,
}

impl<V: Copy> IdMap<V> {
    pub fn new() -> Self {
        Self {
            buckets: (0..DEFAULT_BUCKET_COUNT).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bucket_index(&self, key: u64) -> usize {
        (key % self.buckets.len() as u64) as usize
    }

    pub fn has(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: u64) -> Option<V> {
        let idx = self.bucket_index(key);
        self.buckets[idx]
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Insert `key -> value`. Does not check for an existing key — callers
    /// (the facade's duplicate check, §4.G) are responsible for that.
    pub fn insert(&mut self, key: u64, value: V) {
        let idx = self.bucket_index(key);
        self.buckets[idx].push((key, value));
        self.len += 1;
        if self.len / self.buckets.len() > LOAD_FACTOR_THRESHOLD {
            self.rehash(self.buckets.len() * 2);
        }
    }

    pub fn remove(&mut self, key: u64) -> Option<V> {
        let idx = self.bucket_index(key);
        let bucket = &mut self.buckets[idx];
        let pos = bucket.iter().position(|(k, _)| *k == key)?;
        let (_, value) = bucket.swap_remove(pos);
        self.len -= 1;
        Some(value)
    }

    pub fn purge(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    fn rehash(&mut self, new_bucket_count: usize) {
        let mut new_buckets: Vec<Vec<(u64, V)>> = (0..new_bucket_count).map(|_| Vec::new()).collect();
        for bucket in self.buckets.drain(..) {
            for (k, v) in bucket {
                let idx = (k % new_bucket_count as u64) as usize;
                new_buckets[idx].push((k, v));
            }
        }
        self.buckets = new_buckets;
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, V)> + '_ {
        self.buckets.iter().flatten().map(|(k, v)| (*k, *v))
    }
}

impl<V: Copy> Default for IdMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
