//! Historical analytics assembled from repeated single-date lookups.
//!
//! The two reductions deliberately differ in failure policy:
//! `historical_trend` is all-or-nothing, `monthly_averages` skips months
//! it could not fetch.

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::lookup::WeatherLookup;
use crate::provider::WeatherProvider;
use crate::types::{DailyObservation, HistoricalTrend, MonthlyAverage, WeatherError};

#[derive(Debug, Deserialize)]
struct HistoryPayload {
    forecast: HistoryForecast,
}

#[derive(Debug, Deserialize)]
struct HistoryForecast {
    forecastday: Vec<HistoryDay>,
}

#[derive(Debug, Deserialize)]
struct HistoryDay {
    day: DayTotals,
}

#[derive(Debug, Deserialize)]
struct DayTotals {
    avgtemp_c: f64,
    totalprecip_mm: f64,
}

/// Pull (average temperature, total precipitation) out of a historical payload.
///
/// # Errors
/// `UpstreamMalformed` when the first day record or its fields are missing.
pub fn day_totals(payload: &serde_json::Value) -> Result<(f64, f64), WeatherError> {
    let parsed = HistoryPayload::deserialize(payload)
        .map_err(|e| WeatherError::UpstreamMalformed(format!("historical payload: {}", e)))?;

    let first = parsed.forecast.forecastday.first().ok_or_else(|| {
        WeatherError::UpstreamMalformed("historical payload has no day record".to_string())
    })?;

    Ok((first.day.avgtemp_c, first.day.totalprecip_mm))
}

impl<P: WeatherProvider> WeatherLookup<P> {
    /// Daily series from `today - window_days` through today, inclusive.
    ///
    /// Days are fetched one after another; the first failing day aborts
    /// the whole computation and no partial series is returned.
    ///
    /// # Errors
    /// The first day's fetch or extraction failure, or `InvalidRange` if
    /// the window underflows the calendar.
    pub async fn historical_trend(
        &self,
        location_key: &str,
        window_days: u32,
    ) -> Result<HistoricalTrend, WeatherError> {
        let today = self.clock().now().date_naive();
        let start = today
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .ok_or_else(|| WeatherError::InvalidRange(format!("{} days", window_days)))?;

        self.trend_between(location_key, start, today).await
    }

    /// Same reduction as [`historical_trend`](Self::historical_trend) over
    /// an explicit inclusive date range.
    ///
    /// # Errors
    /// The first day's failure, or `InvalidRange` when `end < start`.
    pub async fn trend_between(
        &self,
        location_key: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistoricalTrend, WeatherError> {
        if end < start {
            return Err(WeatherError::InvalidRange(format!("{} is after {}", start, end)));
        }

        let mut daily = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let snapshot = self
                .resolve_historical(location_key, date)
                .await
                .map_err(|e| {
                    tracing::error!("Error fetching historical trends for {}: {}", date, e);
                    e
                })?;
            let (avg_temp_c, total_precip_mm) = day_totals(&snapshot.payload)?;

            daily.push(DailyObservation {
                date,
                avg_temp_c,
                total_precip_mm,
            });
        }

        Ok(HistoricalTrend::from_daily(daily))
    }

    /// One entry per month of `year`, sampled on the month's first day.
    ///
    /// This is a first-day approximation, not a true monthly mean. Months
    /// whose lookup fails are logged and left out.
    pub async fn monthly_averages(&self, location_key: &str, year: i32) -> Vec<MonthlyAverage> {
        let mut months = Vec::with_capacity(12);

        for month in 1..=12u32 {
            let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) else {
                tracing::warn!("No calendar date for {}-{:02}-01", year, month);
                continue;
            };

            let totals = match self.resolve_historical(location_key, date).await {
                Ok(snapshot) => day_totals(&snapshot.payload),
                Err(e) => Err(e),
            };

            match totals {
                Ok((avg_temp_c, total_precip_mm)) => months.push(MonthlyAverage {
                    month,
                    avg_temp_c,
                    total_precip_mm,
                }),
                Err(e) => {
                    tracing::error!("Error fetching data for {}: {}", date, e);
                }
            }
        }

        months
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_day_totals_extracts_first_day() {
        let payload = serde_json::json!({
            "location": { "name": "London" },
            "forecast": { "forecastday": [
                { "date": "2024-01-01", "day": { "avgtemp_c": 6.2, "totalprecip_mm": 1.4, "maxtemp_c": 9.0 } }
            ]}
        });
        assert_eq!(day_totals(&payload).unwrap(), (6.2, 1.4));
    }

    #[test]
    fn test_day_totals_rejects_empty_day_list() {
        let payload = serde_json::json!({ "forecast": { "forecastday": [] } });
        assert!(matches!(
            day_totals(&payload),
            Err(WeatherError::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_day_totals_rejects_missing_fields() {
        let payload = serde_json::json!({
            "forecast": { "forecastday": [ { "day": { "avgtemp_c": 3.0 } } ] }
        });
        assert!(matches!(
            day_totals(&payload),
            Err(WeatherError::UpstreamMalformed(_))
        ));
    }
}
