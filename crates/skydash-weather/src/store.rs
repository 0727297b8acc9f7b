//! SQLite-backed durable cache tier.
//!
//! Survives restarts. Every write inserts a new row with an explicit
//! `expires_at`; rows at or past their expiry are invisible to reads and
//! are deleted on the next write or purge.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::cache::expiry;
use crate::clock::Clock;
use crate::types::{WeatherError, WeatherSnapshot};

/// Narrow get/put capability of the durable tier.
///
/// Implementations enforce expiry themselves: `get` must never return an
/// entry older than the TTL it was written with.
pub trait DurableCache: Send + Sync {
    /// Most recently fetched non-expired snapshot for `key`.
    fn get(&self, key: &str) -> Result<Option<WeatherSnapshot>, WeatherError>;

    /// Persist `snapshot` as a new record, valid for `ttl` after its `fetched_at`.
    fn put(&self, snapshot: &WeatherSnapshot, ttl: Duration) -> Result<(), WeatherError>;
}

/// SQLite durable cache.
pub struct SqliteWeatherCache {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteWeatherCache {
    /// Open (or create) the cache database at the given path.
    pub fn new<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, WeatherError> {
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
            clock,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (tests and ephemeral runs).
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, WeatherError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self {
            conn: Mutex::new(conn),
            clock,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), WeatherError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location TEXT NOT NULL,
                payload TEXT NOT NULL,
                fetched_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_cache_location ON weather_cache(location, fetched_at_ms DESC);
            CREATE INDEX IF NOT EXISTS idx_weather_cache_expires ON weather_cache(expires_at_ms);
            "#,
        )?;
        Ok(())
    }

    /// Delete every expired row. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, WeatherError> {
        let now = self.clock.now().timestamp_millis();
        let removed = self.conn.lock().execute(
            "DELETE FROM weather_cache WHERE expires_at_ms <= ?1",
            params![now],
        )?;
        if removed > 0 {
            tracing::debug!("Purged {} expired weather cache rows", removed);
        }
        Ok(removed)
    }

    /// Number of stored rows for `key`, expired ones included.
    pub fn row_count(&self, key: &str) -> Result<usize, WeatherError> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM weather_cache WHERE location = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl DurableCache for SqliteWeatherCache {
    fn get(&self, key: &str) -> Result<Option<WeatherSnapshot>, WeatherError> {
        let now = self.clock.now().timestamp_millis();
        let row = self
            .conn
            .lock()
            .query_row(
                r#"
                SELECT payload, fetched_at_ms
                FROM weather_cache
                WHERE location = ?1 AND expires_at_ms > ?2
                ORDER BY fetched_at_ms DESC, id DESC
                LIMIT 1
                "#,
                params![key, now],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((payload, fetched_at_ms)) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&payload)
            .map_err(|e| WeatherError::Cache(format!("Corrupt cached payload: {}", e)))?;
        let fetched_at = DateTime::from_timestamp_millis(fetched_at_ms)
            .ok_or_else(|| WeatherError::Cache(format!("Invalid timestamp: {}", fetched_at_ms)))?;

        Ok(Some(WeatherSnapshot {
            location_key: key.to_string(),
            payload,
            fetched_at,
        }))
    }

    fn put(&self, snapshot: &WeatherSnapshot, ttl: Duration) -> Result<(), WeatherError> {
        self.purge_expired()?;

        let payload = serde_json::to_string(&snapshot.payload)
            .map_err(|e| WeatherError::Cache(e.to_string()))?;
        let fetched_at = snapshot.fetched_at.timestamp_millis();
        let expires_at = expiry(snapshot.fetched_at, ttl).timestamp_millis();

        self.conn.lock().execute(
            r#"
            INSERT INTO weather_cache (location, payload, fetched_at_ms, expires_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![snapshot.location_key, payload, fetched_at, expires_at],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteWeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWeatherCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::clock::ManualClock;

    const TTL: i64 = 1800;

    fn setup() -> (Arc<ManualClock>, SqliteWeatherCache) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SqliteWeatherCache::in_memory(clock.clone()).unwrap();
        (clock, cache)
    }

    fn snapshot(key: &str, temp: f64, at: DateTime<Utc>) -> WeatherSnapshot {
        WeatherSnapshot {
            location_key: key.to_string(),
            payload: serde_json::json!({ "location": { "name": key }, "current": { "temp_c": temp } }),
            fetched_at: at,
        }
    }

    #[test]
    fn test_put_and_get() {
        let (clock, cache) = setup();
        cache.put(&snapshot("Berlin", 5.5, clock.now()), Duration::seconds(TTL)).unwrap();

        let hit = cache.get("Berlin").unwrap().unwrap();
        assert_eq!(hit.payload["current"]["temp_c"], 5.5);
        assert_eq!(hit.location_key, "Berlin");
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let (_clock, cache) = setup();
        assert!(cache.get("Atlantis").unwrap().is_none());
    }

    #[test]
    fn test_get_returns_most_recent_row() {
        let (clock, cache) = setup();
        cache.put(&snapshot("Rome", 14.0, clock.now()), Duration::seconds(TTL)).unwrap();
        clock.advance(Duration::seconds(60));
        cache.put(&snapshot("Rome", 15.0, clock.now()), Duration::seconds(TTL)).unwrap();

        let hit = cache.get("Rome").unwrap().unwrap();
        assert_eq!(hit.payload["current"]["temp_c"], 15.0);
        assert_eq!(cache.row_count("Rome").unwrap(), 2);
    }

    #[test]
    fn test_entry_absent_after_ttl() {
        let (clock, cache) = setup();
        cache.put(&snapshot("Madrid", 20.0, clock.now()), Duration::seconds(TTL)).unwrap();

        clock.advance(Duration::seconds(1799));
        assert!(cache.get("Madrid").unwrap().is_some());

        clock.advance(Duration::seconds(2));
        assert!(cache.get("Madrid").unwrap().is_none());
    }

    #[test]
    fn test_expired_rows_are_purged_on_write() {
        let (clock, cache) = setup();
        cache.put(&snapshot("Lima", 18.0, clock.now()), Duration::seconds(TTL)).unwrap();
        clock.advance(Duration::seconds(TTL + 1));
        cache.put(&snapshot("Lima", 19.0, clock.now()), Duration::seconds(TTL)).unwrap();

        assert_eq!(cache.row_count("Lima").unwrap(), 1);
    }

    #[test]
    fn test_huge_ttl_is_stored_without_overflow() {
        let (clock, cache) = setup();
        let ttl = Duration::try_seconds(10_000_000_000_000).unwrap();
        cache.put(&snapshot("Cairo", 25.0, clock.now()), ttl).unwrap();

        clock.advance(Duration::days(365 * 100));
        assert!(cache.get("Cairo").unwrap().is_some());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather_cache.db");
        let clock = Arc::new(ManualClock::new(Utc::now()));

        {
            let cache = SqliteWeatherCache::new(&path, clock.clone()).unwrap();
            cache.put(&snapshot("Quito", 13.0, clock.now()), Duration::seconds(TTL)).unwrap();
        }

        let reopened = SqliteWeatherCache::new(&path, clock.clone()).unwrap();
        assert!(reopened.get("Quito").unwrap().is_some());

        clock.advance(Duration::seconds(TTL + 1));
        assert!(reopened.get("Quito").unwrap().is_none());
    }
}
