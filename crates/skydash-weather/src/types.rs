use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Provider weather data for one location key at one instant.
///
/// The key is used exactly as the caller supplied it: "London", "london"
/// and "51.5,-0.12" are three different entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_key: String,
    /// Provider document, returned verbatim
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// One result of the provider's location autocomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Any other fields the provider sends, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-day values extracted from a historical payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    #[serde(rename = "avgTemp_c")]
    pub avg_temp_c: f64,
    #[serde(rename = "totalPrecip_mm")]
    pub total_precip_mm: f64,
}

/// Reduction of a run of daily observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalTrend {
    pub average_temperature: f64,
    pub total_precipitation: f64,
    pub daily_data: Vec<DailyObservation>,
}

impl HistoricalTrend {
    /// Build the trend from a day series: mean temperature, summed precipitation.
    pub fn from_daily(daily_data: Vec<DailyObservation>) -> Self {
        let total_precipitation = daily_data.iter().map(|d| d.total_precip_mm).sum();
        let average_temperature = if daily_data.is_empty() {
            0.0
        } else {
            daily_data.iter().map(|d| d.avg_temp_c).sum::<f64>() / daily_data.len() as f64
        };

        Self {
            average_temperature,
            total_precipitation,
            daily_data,
        }
    }
}

/// Values for one month, sampled on its first day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAverage {
    /// 1 = January
    pub month: u32,
    #[serde(rename = "avgTemp_c")]
    pub avg_temp_c: f64,
    #[serde(rename = "totalPrecip_mm")]
    pub total_precip_mm: f64,
}

/// Weather lookup errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// Network failure, timeout or non-success status from the provider.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Provider answered, but not with what we expected.
    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),
    /// A cache tier could not be read or written.
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key
        let e = e.without_url();
        if e.is_timeout() {
            Self::UpstreamUnavailable(format!("request timed out: {}", e))
        } else if e.is_decode() {
            Self::UpstreamMalformed(e.to_string())
        } else {
            Self::UpstreamUnavailable(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for WeatherError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Cache(e.to_string())
    }
}
