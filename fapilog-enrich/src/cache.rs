use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-enricher cache with TTL and LRU eviction (§4.4, §9), for deterministic
/// lookups across repeated calls with the same key. Grounded on
/// `r2e-cache::TtlCache`'s lazy-expiry-on-read `DashMap` base, extended with
/// an access-order queue to bound the cache to `max_size` entries.
pub struct EnricherCache<K, V> {
    entries: DashMap<K, (V, Instant)>,
    order: Mutex<VecDeque<K>>,
    ttl: Duration,
    max_size: usize,
}

impl<K, V> EnricherCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        EnricherCache {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            ttl,
            max_size,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.1.elapsed() < self.ttl {
                return Some(entry.0.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let mut order = self.order.lock().unwrap();
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_size {
                if let Some(oldest) = order.pop_front() {
                    self.entries.remove(&oldest);
                } else {
                    break;
                }
            }
            order.push_back(key.clone());
        }
        self.entries.insert(key, (value, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
