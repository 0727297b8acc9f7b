//! Upstream weather provider (weatherapi.com-compatible).

use chrono::NaiveDate;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::types::{LocationMatch, WeatherError};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "SkyDash/0.1.0";

/// External weather data service.
///
/// Every call consumes provider quota; callers are expected to cache.
pub trait WeatherProvider: Send + Sync {
    /// Current conditions plus a `days`-day forecast.
    fn forecast(
        &self,
        location: &str,
        days: u8,
        air_quality: bool,
    ) -> impl Future<Output = Result<serde_json::Value, WeatherError>> + Send;

    /// Historical record for a single calendar date.
    fn history(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<serde_json::Value, WeatherError>> + Send;

    /// Location autocomplete.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<LocationMatch>, WeatherError>> + Send;
}

/// HTTP client for the weather provider.
#[derive(Clone)]
pub struct WeatherApiClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl WeatherApiClient {
    /// Create a client with the default request timeout.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, WeatherError> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client whose every request is bounded by `timeout`.
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Provider {} returned {}: {}", endpoint, status, body);
            return Err(WeatherError::UpstreamUnavailable(format!(
                "{} returned status {}",
                endpoint, status
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Provider {} sent undecodable body: {}", endpoint, e);
            WeatherError::UpstreamMalformed(format!("{}: {}", endpoint, e))
        })
    }
}

impl std::fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WeatherProvider for WeatherApiClient {
    #[instrument(skip(self), level = "debug")]
    async fn forecast(
        &self,
        location: &str,
        days: u8,
        air_quality: bool,
    ) -> Result<serde_json::Value, WeatherError> {
        let aqi = if air_quality { "yes" } else { "no" };
        self.get_json(
            "forecast.json",
            &[
                ("q", location.to_string()),
                ("days", days.to_string()),
                ("aqi", aqi.to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn history(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<serde_json::Value, WeatherError> {
        self.get_json(
            "history.json",
            &[
                ("q", location.to_string()),
                ("dt", date.format("%Y-%m-%d").to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn search(&self, query: &str) -> Result<Vec<LocationMatch>, WeatherError> {
        let body = self
            .get_json("search.json", &[("q", query.to_string())])
            .await?;
        serde_json::from_value(body)
            .map_err(|e| WeatherError::UpstreamMalformed(format!("search.json: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = WeatherApiClient::new("http://api.weatherapi.com/v1/", "k").unwrap();
        assert_eq!(client.base_url, "http://api.weatherapi.com/v1");
    }

    #[test]
    fn test_debug_omits_api_key() {
        let client = WeatherApiClient::new("http://localhost/v1", "very-secret").unwrap();
        assert!(!format!("{:?}", client).contains("very-secret"));
    }
}
