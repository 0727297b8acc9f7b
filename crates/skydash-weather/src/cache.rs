//! In-process cache tier.
//!
//! Entries live only as long as the process and expire on their own clock,
//! reset every time a key is (re)populated.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::types::WeatherSnapshot;

#[derive(Debug, Clone)]
struct LocalEntry {
    snapshot: WeatherSnapshot,
    expires_at: DateTime<Utc>,
}

/// `from + ttl`, saturating at the latest representable instant.
pub(crate) fn expiry(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    from.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Volatile per-process weather cache.
#[derive(Debug)]
pub struct LocalCache {
    entries: Mutex<HashMap<String, LocalEntry>>,
    clock: Arc<dyn Clock>,
}

impl LocalCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Get the snapshot for `key` if it has not expired.
    ///
    /// An expired entry is dropped on the way out.
    pub fn get(&self, key: &str) -> Option<WeatherSnapshot> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.snapshot.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `snapshot` under `key`, valid for `ttl` from now.
    pub fn put(&self, key: &str, snapshot: WeatherSnapshot, ttl: Duration) {
        let expires_at = expiry(self.clock.now(), ttl);
        self.entries
            .lock()
            .insert(key.to_string(), LocalEntry { snapshot, expires_at });
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::clock::ManualClock;

    fn snapshot(key: &str, temp: f64, at: DateTime<Utc>) -> WeatherSnapshot {
        WeatherSnapshot {
            location_key: key.to_string(),
            payload: serde_json::json!({ "current": { "temp_c": temp } }),
            fetched_at: at,
        }
    }

    fn setup() -> (Arc<ManualClock>, LocalCache) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = LocalCache::new(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_put_then_get() {
        let (clock, cache) = setup();
        let snap = snapshot("London", 11.0, clock.now());
        cache.put("London", snap.clone(), Duration::seconds(1800));
        assert_eq!(cache.get("London"), Some(snap));
    }

    #[test]
    fn test_keys_are_not_normalized() {
        let (clock, cache) = setup();
        cache.put("New York", snapshot("New York", 3.0, clock.now()), Duration::seconds(1800));
        assert!(cache.get("new york").is_none());
        assert!(cache.get("40.7,-74.0").is_none());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (clock, cache) = setup();
        cache.put("Paris", snapshot("Paris", 9.0, clock.now()), Duration::seconds(1800));

        clock.advance(Duration::seconds(1799));
        assert!(cache.get("Paris").is_some());

        clock.advance(Duration::seconds(2));
        assert!(cache.get("Paris").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_resets_expiry() {
        let (clock, cache) = setup();
        cache.put("Oslo", snapshot("Oslo", -2.0, clock.now()), Duration::seconds(1800));
        clock.advance(Duration::seconds(1500));
        cache.put("Oslo", snapshot("Oslo", -1.0, clock.now()), Duration::seconds(1800));
        clock.advance(Duration::seconds(1500));

        let hit = cache.get("Oslo");
        assert_eq!(hit.map(|s| s.payload["current"]["temp_c"].clone()), Some(serde_json::json!(-1.0)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (clock, cache) = setup();
        let ttl = Duration::try_seconds(10_000_000_000_000).unwrap();
        cache.put("Lagos", snapshot("Lagos", 30.0, clock.now()), ttl);

        clock.advance(Duration::days(365 * 100));
        assert!(cache.get("Lagos").is_some());
        assert_eq!(expiry(clock.now(), ttl), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_purge_expired() {
        let (clock, cache) = setup();
        cache.put("A", snapshot("A", 1.0, clock.now()), Duration::seconds(10));
        cache.put("B", snapshot("B", 2.0, clock.now()), Duration::seconds(100));
        clock.advance(Duration::seconds(50));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
