//! Composition root: builds every long-lived component from `Config`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use skydash_core::Config;
use skydash_profile::{ProfileClient, SqliteProfileStore};
use skydash_weather::{
    Clock, LocalCache, LookupSettings, SqliteWeatherCache, SystemClock, WeatherApiClient,
    WeatherLookup,
};

use crate::auth::TokenTable;

pub type Lookup = WeatherLookup<WeatherApiClient>;

/// Shared handles passed to every route.
#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<Lookup>,
    pub profiles: ProfileClient,
    pub tokens: Arc<TokenTable>,
    pub local_cache: Arc<LocalCache>,
    pub weather_cache: Arc<SqliteWeatherCache>,
}

impl AppState {
    /// Open both databases under `data_dir`, build the lookup and seed
    /// configured users.
    pub async fn build(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.data_dir.display()
            )
        })?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let local_cache = Arc::new(LocalCache::new(clock.clone()));
        let weather_cache = Arc::new(
            SqliteWeatherCache::new(config.weather_cache_path(), clock.clone())
                .context("Failed to open weather cache")?,
        );

        let api_key = config.weather.api_key.as_deref().unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("No weather API key configured; provider requests will fail");
        }
        let provider = WeatherApiClient::with_timeout(
            &config.weather.api_base_url,
            api_key,
            Duration::from_secs(config.weather.request_timeout_secs),
        )
        .context("Failed to build weather provider client")?;

        let ttl = i64::try_from(config.weather.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("cache_ttl_secs is out of range")?;
        let settings = LookupSettings {
            ttl,
            forecast_days: config.weather.forecast_days,
            air_quality: config.weather.air_quality,
        };

        let lookup = WeatherLookup::new(
            provider,
            local_cache.clone(),
            weather_cache.clone(),
            clock,
            settings,
        );

        let store = SqliteProfileStore::new(config.profiles_path())
            .context("Failed to open profile store")?;
        let profiles = ProfileClient::new(store);
        let tokens = TokenTable::seed(&config.auth, &profiles)
            .await
            .context("Failed to seed configured users")?;

        Ok(Self {
            lookup: Arc::new(lookup),
            profiles,
            tokens: Arc::new(tokens),
            local_cache,
            weather_cache,
        })
    }

    /// Periodically drop expired entries from both cache tiers.
    ///
    /// Lookups already ignore expired entries; this only bounds memory and
    /// table growth.
    pub fn spawn_cache_janitor(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let local = self.local_cache.clone();
        let durable = self.weather_cache.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;

                let dropped = local.purge_expired();
                let durable = durable.clone();
                match tokio::task::spawn_blocking(move || durable.purge_expired()).await {
                    Ok(Ok(rows)) => {
                        tracing::debug!(
                            "Cache purge: {} local entries, {} durable rows",
                            dropped,
                            rows
                        );
                    }
                    Ok(Err(e)) => tracing::warn!("Durable cache purge failed: {}", e),
                    Err(e) => tracing::warn!("Durable cache purge task failed: {}", e),
                }
            }
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("lookup", &self.lookup)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
