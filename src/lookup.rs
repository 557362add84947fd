//! Hash-only membership sets backing every "seen this already?" question.
//!
//! Only 64-bit fingerprints are stored, never the items themselves. The exact
//! set is a plain `HashSet<u64>`; the bounded set is a best-effort cache that
//! evicts when full and may therefore forget entries.

use crate::fingerprint::persistent_hash;
use indexmap::IndexSet;
use lru::LruCache;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Common surface of the exact and bounded sets.
pub trait Lookup: Send {
    /// Returns `true` when the fingerprint was not present before.
    fn insert(&mut self, fingerprint: u64) -> bool;
    fn contains(&self, fingerprint: u64) -> bool;
    fn len(&self) -> usize;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_key(&mut self, key: &str) -> bool {
        self.insert(persistent_hash(key))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.contains(persistent_hash(key))
    }

    /// Raw fingerprints, sorted, for suspend/resume.
    fn dump(&self) -> Vec<u64>;
}

/// Exact set semantics over fingerprints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSet {
    hashes: HashSet<u64>,
}

impl LookupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<I: IntoIterator<Item = u64>>(fingerprints: I) -> Self {
        Self {
            hashes: fingerprints.into_iter().collect(),
        }
    }
}

impl Lookup for LookupSet {
    fn insert(&mut self, fingerprint: u64) -> bool {
        self.hashes.insert(fingerprint)
    }

    fn contains(&self, fingerprint: u64) -> bool {
        self.hashes.contains(&fingerprint)
    }

    fn len(&self) -> usize {
        self.hashes.len()
    }

    fn clear(&mut self) {
        self.hashes.clear();
    }

    fn dump(&self) -> Vec<u64> {
        let mut all: Vec<u64> = self.hashes.iter().copied().collect();
        all.sort_unstable();
        all
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    #[default]
    Random,
    Lru,
}

enum Store {
    Random(IndexSet<u64>),
    Lru(LruCache<u64, ()>),
}

/// Capacity-bounded lookup. Inserting into a full set evicts per policy.
pub struct BoundedLookupSet {
    capacity: NonZeroUsize,
    store: Store,
}

impl BoundedLookupSet {
    pub fn new(capacity: NonZeroUsize, policy: EvictionPolicy) -> Self {
        let store = match policy {
            EvictionPolicy::Random => Store::Random(IndexSet::with_capacity(capacity.get())),
            EvictionPolicy::Lru => Store::Lru(LruCache::new(capacity)),
        };
        Self { capacity, store }
    }

    pub fn policy(&self) -> EvictionPolicy {
        match self.store {
            Store::Random(_) => EvictionPolicy::Random,
            Store::Lru(_) => EvictionPolicy::Lru,
        }
    }
}

impl Lookup for BoundedLookupSet {
    fn insert(&mut self, fingerprint: u64) -> bool {
        match &mut self.store {
            Store::Random(set) => {
                if set.contains(&fingerprint) {
                    return false;
                }
                if set.len() >= self.capacity.get() {
                    let victim = rand::thread_rng().gen_range(0..set.len());
                    set.swap_remove_index(victim);
                }
                set.insert(fingerprint)
            }
            // `put` refreshes recency for existing keys and evicts the LRU entry when full
            Store::Lru(cache) => cache.put(fingerprint, ()).is_none(),
        }
    }

    fn contains(&self, fingerprint: u64) -> bool {
        match &self.store {
            Store::Random(set) => set.contains(&fingerprint),
            Store::Lru(cache) => cache.contains(&fingerprint),
        }
    }

    fn len(&self) -> usize {
        match &self.store {
            Store::Random(set) => set.len(),
            Store::Lru(cache) => cache.len(),
        }
    }

    fn clear(&mut self) {
        match &mut self.store {
            Store::Random(set) => set.clear(),
            Store::Lru(cache) => cache.clear(),
        }
    }

    fn dump(&self) -> Vec<u64> {
        let mut all: Vec<u64> = match &self.store {
            Store::Random(set) => set.iter().copied().collect(),
            Store::Lru(cache) => cache.iter().map(|(k, _)| *k).collect(),
        };
        all.sort_unstable();
        all
    }
}
