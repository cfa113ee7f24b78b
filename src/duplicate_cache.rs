//! Bounded `(source, seq)` duplicate cache for P1 flooding mode (spec §4.7).
//!
//! P2/P3 unicast routing never touches this — a route table already
//! prevents loops. Only flooding (no route table, no cost function)
//! needs "have I already relayed this exact packet" detection, with
//! bounded memory.

use crate::address::Address;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Configuration for the duplicate cache.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for DuplicateCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 64,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Key identifying one flooded packet.
pub type PacketKey = (Address, u16);

struct Entry {
    last_seen: Instant,
}

/// LRU+TTL cache of recently seen `(source, seq)` pairs.
pub struct DuplicateCache {
    config: DuplicateCacheConfig,
    entries: HashMap<PacketKey, Entry>,
    /// Insertion order, oldest first, for LRU eviction.
    order: Vec<PacketKey>,
}

impl DuplicateCache {
    pub fn new(config: DuplicateCacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.max_entries),
            order: Vec::with_capacity(config.max_entries),
            config,
        }
    }

    /// Record `key` as seen at `now`. Returns `true` if this is the first
    /// time it's been seen (caller should forward it), `false` if it's a
    /// duplicate (caller should drop it).
    pub fn observe(&mut self, key: PacketKey, now: Instant) -> bool {
        self.evict_expired(now);

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_seen = now;
            return false;
        }

        if self.entries.len() >= self.config.max_entries {
            self.evict_lru();
        }

        self.entries.insert(key, Entry { last_seen: now });
        self.order.push(key);
        true
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.config.ttl;
        let expired: Vec<PacketKey> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_seen) >= ttl)
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.order.retain(|k| *k != key);
        }
    }

    fn evict_lru(&mut self) {
        if !self.order.is_empty() {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loramesh_macros::esp32_test;

    #[esp32_test]
    fn test_first_observation_is_new() {
        let mut cache = DuplicateCache::new(DuplicateCacheConfig::default());
        assert!(cache.observe((Address(1), 5), Instant::now()));
    }

    #[esp32_test]
    fn test_repeat_observation_is_duplicate() {
        let mut cache = DuplicateCache::new(DuplicateCacheConfig::default());
        let now = Instant::now();
        assert!(cache.observe((Address(1), 5), now));
        assert!(!cache.observe((Address(1), 5), now));
    }

    #[esp32_test]
    fn test_different_seq_is_new() {
        let mut cache = DuplicateCache::new(DuplicateCacheConfig::default());
        let now = Instant::now();
        assert!(cache.observe((Address(1), 5), now));
        assert!(cache.observe((Address(1), 6), now));
    }

    #[esp32_test]
    fn test_expired_entry_treated_as_new_again() {
        let config = DuplicateCacheConfig { max_entries: 64, ttl: Duration::from_secs(10) };
        let mut cache = DuplicateCache::new(config);
        let now = Instant::now();
        assert!(cache.observe((Address(1), 5), now));
        assert!(cache.observe((Address(1), 5), now + Duration::from_secs(20)));
    }

    #[esp32_test]
    fn test_eviction_bounds_memory() {
        let config = DuplicateCacheConfig { max_entries: 2, ttl: Duration::from_secs(3600) };
        let mut cache = DuplicateCache::new(config);
        let now = Instant::now();
        cache.observe((Address(1), 1), now);
        cache.observe((Address(1), 2), now);
        cache.observe((Address(1), 3), now);
        assert_eq!(cache.len(), 2);
    }

    #[esp32_test]
    fn test_lru_eviction_drops_oldest_first() {
        let config = DuplicateCacheConfig { max_entries: 2, ttl: Duration::from_secs(3600) };
        let mut cache = DuplicateCache::new(config);
        let now = Instant::now();
        cache.observe((Address(1), 1), now);
        cache.observe((Address(1), 2), now);
        cache.observe((Address(1), 3), now);
        // (1,1) should have been evicted, so it looks new again
        assert!(cache.observe((Address(1), 1), now));
    }
}
