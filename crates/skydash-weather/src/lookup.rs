//! Two-tier weather lookup with upstream fallback.

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::instrument;

use crate::cache::LocalCache;
use crate::clock::Clock;
use crate::provider::WeatherProvider;
use crate::store::DurableCache;
use crate::types::{LocationMatch, WeatherError, WeatherSnapshot};

/// Default validity window for both tiers (30 minutes).
pub const DEFAULT_TTL_SECS: i64 = 1800;

#[derive(Debug, Clone)]
pub struct LookupSettings {
    /// Validity window of both tiers
    pub ttl: Duration,
    /// Forecast days requested on a miss
    pub forecast_days: u8,
    /// Ask the provider for air quality along with the forecast
    pub air_quality: bool,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            forecast_days: 7,
            air_quality: true,
        }
    }
}

/// Resolves location keys to weather snapshots.
///
/// Lookup order is local tier, durable tier, provider; it stops at the
/// first tier holding a live entry. Concurrent misses on the same key are
/// not coalesced: each caller fetches upstream and writes its own record.
pub struct WeatherLookup<P> {
    provider: P,
    local: Arc<LocalCache>,
    durable: Arc<dyn DurableCache>,
    clock: Arc<dyn Clock>,
    settings: LookupSettings,
}

impl<P: WeatherProvider> WeatherLookup<P> {
    pub fn new(
        provider: P,
        local: Arc<LocalCache>,
        durable: Arc<dyn DurableCache>,
        clock: Arc<dyn Clock>,
        settings: LookupSettings,
    ) -> Self {
        Self {
            provider,
            local,
            durable,
            clock,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &LookupSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Resolve current conditions + forecast for `location_key`.
    ///
    /// # Errors
    /// Returns `UpstreamUnavailable` / `UpstreamMalformed` when both tiers
    /// miss and the provider fetch fails. Cache tier failures never
    /// surface here.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, location_key: &str) -> Result<WeatherSnapshot, WeatherError> {
        if let Some(snapshot) = self.local.get(location_key) {
            tracing::debug!("Local cache hit for {}", location_key);
            return Ok(snapshot);
        }

        if let Some(snapshot) = self.durable_get(location_key).await {
            tracing::debug!("Durable cache hit for {}", location_key);
            self.local
                .put(location_key, snapshot.clone(), self.settings.ttl);
            return Ok(snapshot);
        }

        tracing::debug!("Cache miss for {}, fetching from provider", location_key);
        let payload = self
            .provider
            .forecast(
                location_key,
                self.settings.forecast_days,
                self.settings.air_quality,
            )
            .await
            .map_err(|e| {
                tracing::error!("Weather API error for {}: {}", location_key, e);
                e
            })?;

        let snapshot = WeatherSnapshot {
            location_key: location_key.to_string(),
            payload,
            fetched_at: self.clock.now(),
        };

        self.local
            .put(location_key, snapshot.clone(), self.settings.ttl);
        self.durable_put(&snapshot).await;

        Ok(snapshot)
    }

    /// Fetch the provider's historical record for one date. Never cached.
    ///
    /// # Errors
    /// Returns the provider failure unchanged.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_historical(
        &self,
        location_key: &str,
        date: NaiveDate,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let payload = self.provider.history(location_key, date).await?;
        Ok(WeatherSnapshot {
            location_key: location_key.to_string(),
            payload,
            fetched_at: self.clock.now(),
        })
    }

    /// Provider location autocomplete. Never cached.
    ///
    /// # Errors
    /// Returns the provider failure unchanged.
    pub async fn search(&self, query: &str) -> Result<Vec<LocationMatch>, WeatherError> {
        self.provider.search(query).await.map_err(|e| {
            tracing::error!("Location search error for {:?}: {}", query, e);
            e
        })
    }

    /// Durable read; any failure counts as a miss.
    async fn durable_get(&self, location_key: &str) -> Option<WeatherSnapshot> {
        let durable = self.durable.clone();
        let key = location_key.to_string();

        match tokio::task::spawn_blocking(move || durable.get(&key)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                tracing::warn!("Durable cache read failed for {}: {}", location_key, e);
                None
            }
            Err(e) => {
                tracing::warn!("Durable cache read task failed: {}", e);
                None
            }
        }
    }

    /// Durable write; failures are logged and swallowed.
    async fn durable_put(&self, snapshot: &WeatherSnapshot) {
        let durable = self.durable.clone();
        let record = snapshot.clone();
        let ttl = self.settings.ttl;

        match tokio::task::spawn_blocking(move || durable.put(&record, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    "Durable cache write failed for {}: {}",
                    snapshot.location_key,
                    e
                );
            }
            Err(e) => {
                tracing::warn!("Durable cache write task failed: {}", e);
            }
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for WeatherLookup<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherLookup")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
