use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache as OrderedMap;
use parking_lot::Mutex;

/// Sharded, approximately-LRU cache for code/storage reads (§5: "Code and
/// storage LRU caches use per-bucket locks and an epoch-based LRU update
/// amortization").
///
/// Each shard guards its own ordering with a `Mutex`, so lookups from
/// different shards never contend. Within a shard, the recency list is only
/// reordered once per `touch_period` accesses (an "epoch"), trading perfect
/// LRU order for far fewer list manipulations under hot read traffic.
pub struct ShardedLru<K, V> {
    shards: Vec<Mutex<Shard<K, V>>>,
    shard_mask: u64,
    touch_period: u64,
}

struct Shard<K, V> {
    map: OrderedMap<K, V>,
    epoch: AtomicU64,
}

impl<K, V> ShardedLru<K, V>
where
    K: Eq + Hash + Clone,
{
    /// `per_shard_capacity` bounds each shard independently; total capacity
    /// is approximately `shard_count * per_shard_capacity`.
    pub fn new(shard_count: usize, per_shard_capacity: usize, touch_period: u64) -> Self {
        let shard_count = shard_count.next_power_of_two();
        let cap = NonZeroUsize::new(per_shard_capacity.max(1)).unwrap();
        let shards = (0..shard_count)
            .map(|_| {
                Mutex::new(Shard {
                    map: OrderedMap::new(cap),
                    epoch: AtomicU64::new(0),
                })
            })
            .collect();
        Self {
            shards,
            shard_mask: shard_count as u64 - 1,
            touch_period: touch_period.max(1),
        }
    }

    fn shard_for(&self, hash: u64) -> &Mutex<Shard<K, V>> {
        &self.shards[(hash & self.shard_mask) as usize]
    }

    /// Looks up `key`, hashed externally by the caller (typically the low
    /// bits of an address or code hash) so callers can pick the shard
    /// without re-hashing a `K` that may be expensive to hash.
    pub fn get(&self, shard_hash: u64, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let shard = self.shard_for(shard_hash).lock();
        let mut shard = shard;
        let epoch = shard.epoch.fetch_add(1, Ordering::Relaxed);
        if epoch % self.touch_period == 0 {
            shard.map.get(key).cloned()
        } else {
            shard.map.peek(key).cloned()
        }
    }

    pub fn insert(&self, shard_hash: u64, key: K, value: V) {
        self.shard_for(shard_hash).lock().map.put(key, value);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let cache: ShardedLru<u64, &'static str> = ShardedLru::new(4, 8, 4);
        cache.insert(42, 42, "hello");
        assert_eq!(cache.get(42, &42), Some("hello"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn shards_evict_independently() {
        let cache: ShardedLru<u64, u64> = ShardedLru::new(2, 2, 1);
        for i in 0..8u64 {
            cache.insert(i, i, i * 10);
        }
        assert!(cache.len() <= 4);
    }
}
