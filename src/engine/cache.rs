use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::Clock;

/// Explicitly owned TTL cache. The clock is injected so expiry is
/// deterministic under test, and invalidation is explicit via `clear`;
/// there is no ambient module state.
pub struct TtlCache<K, V> {
    entries: DashMap<K, (V, DateTime<Utc>)>,
    ttl: Duration,
    clock: Clock,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Clock) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = (self.clock)();
        match self.entries.get(key) {
            Some(entry) if entry.value().1 > now => Some(entry.value().0.clone()),
            _ => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let expires_at = (self.clock)() + self.ttl;
        self.entries.insert(key, (value, expires_at));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn test_clock(offset_secs: Arc<AtomicI64>) -> Clock {
        let base = Utc::now();
        Arc::new(move || base + Duration::seconds(offset_secs.load(Ordering::SeqCst)))
    }

    #[test]
    fn entries_expire_when_the_clock_advances() {
        let offset = Arc::new(AtomicI64::new(0));
        let cache: TtlCache<u8, &str> = TtlCache::new(Duration::seconds(300), test_clock(offset.clone()));

        cache.insert(1, "monday");
        assert_eq!(cache.get(&1), Some("monday"));

        offset.store(301, Ordering::SeqCst);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn clear_drops_everything_immediately() {
        let offset = Arc::new(AtomicI64::new(0));
        let cache: TtlCache<u8, &str> = TtlCache::new(Duration::seconds(300), test_clock(offset));

        cache.insert(1, "monday");
        cache.insert(2, "tuesday");
        cache.clear();
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), None);
    }
}
