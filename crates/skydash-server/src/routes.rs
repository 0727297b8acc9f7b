//! HTTP routes.

use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use skydash_profile::{NewLocation, PreferencesUpdate};
use skydash_weather::Clock;
use warp::{Filter, Rejection, Reply};

use crate::auth::{with_caller, CallerIdentity};
use crate::error::{bad_request, handle_rejection, reject, weather_error};
use crate::state::AppState;

/// Trend window used when `days` is not given.
pub const DEFAULT_TREND_DAYS: u32 = 30;
/// One provider call per day in the window; keep it bounded.
pub const MAX_TREND_DAYS: u32 = 365;

const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    dt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    days: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MonthlyQuery {
    year: Option<String>,
}

/// The full API, with error recovery and request tracing applied.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    health
        .or(weather_routes(state.clone()))
        .or(user_routes(state))
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn caller(state: &AppState) -> impl Filter<Extract = (CallerIdentity,), Error = Rejection> + Clone {
    with_caller(Arc::clone(&state.tokens))
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn weather_routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let forecast = warp::path!("weather" / "forecast" / String)
        .and(warp::get())
        .and(caller(&state))
        .and(with_state(state.clone()))
        .and_then(forecast);

    let history = warp::path!("weather" / "history" / String)
        .and(warp::get())
        .and(caller(&state))
        .and(warp::query::<HistoryQuery>())
        .and(with_state(state.clone()))
        .and_then(history);

    let search = warp::path!("weather" / "search")
        .and(warp::get())
        .and(caller(&state))
        .and(warp::query::<SearchQuery>())
        .and(with_state(state.clone()))
        .and_then(search);

    let trends = warp::path!("weather" / "analytics" / "trends" / String)
        .and(warp::get())
        .and(caller(&state))
        .and(warp::query::<TrendQuery>())
        .and(with_state(state.clone()))
        .and_then(trends);

    let monthly = warp::path!("weather" / "analytics" / "monthly" / String)
        .and(warp::get())
        .and(caller(&state))
        .and(warp::query::<MonthlyQuery>())
        .and(with_state(state))
        .and_then(monthly);

    forecast.or(history).or(search).or(trends).or(monthly)
}

fn user_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let profile = warp::path!("user" / "profile")
        .and(warp::get())
        .and(caller(&state))
        .and(with_state(state.clone()))
        .and_then(get_profile);

    let preferences = warp::path!("user" / "preferences")
        .and(warp::put())
        .and(caller(&state))
        .and(json_body::<PreferencesUpdate>())
        .and(with_state(state.clone()))
        .and_then(update_preferences);

    let add_location = warp::path!("user" / "locations")
        .and(warp::post())
        .and(caller(&state))
        .and(json_body::<NewLocation>())
        .and(with_state(state.clone()))
        .and_then(add_location);

    let remove_location = warp::path!("user" / "locations" / String)
        .and(warp::delete())
        .and(caller(&state))
        .and(with_state(state.clone()))
        .and_then(remove_location);

    let set_default = warp::path!("user" / "locations" / String / "default")
        .and(warp::put())
        .and(caller(&state))
        .and(with_state(state))
        .and_then(set_default_location);

    profile
        .or(preferences)
        .or(add_location)
        .or(remove_location)
        .or(set_default)
}

/// Percent-decode a path segment. Nothing else is done to it.
fn decode_segment(raw: &str) -> Result<String, Rejection> {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .map_err(|_| bad_request(format!("path segment is not valid UTF-8: {}", raw)))
}

async fn forecast(
    location: String,
    _caller: CallerIdentity,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let key = decode_segment(&location)?;
    let snapshot = state
        .lookup
        .resolve(&key)
        .await
        .map_err(|e| reject(weather_error(e)))?;
    Ok(warp::reply::json(&snapshot.payload))
}

async fn history(
    location: String,
    _caller: CallerIdentity,
    query: HistoryQuery,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let key = decode_segment(&location)?;
    let raw = query
        .dt
        .ok_or_else(|| bad_request("missing dt parameter"))?;
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request(format!("dt is not a YYYY-MM-DD date: {}", raw)))?;

    let snapshot = state
        .lookup
        .resolve_historical(&key, date)
        .await
        .map_err(|e| reject(weather_error(e)))?;
    Ok(warp::reply::json(&snapshot.payload))
}

async fn search(
    _caller: CallerIdentity,
    query: SearchQuery,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("missing q parameter"))?;

    let matches = state
        .lookup
        .search(&q)
        .await
        .map_err(|e| reject(weather_error(e)))?;
    Ok(warp::reply::json(&matches))
}

async fn trends(
    location: String,
    _caller: CallerIdentity,
    query: TrendQuery,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let key = decode_segment(&location)?;
    let days = match query.days {
        None => DEFAULT_TREND_DAYS,
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|d| *d <= MAX_TREND_DAYS)
            .ok_or_else(|| bad_request(format!("days must be 0..={}: {}", MAX_TREND_DAYS, raw)))?,
    };

    let trend = state
        .lookup
        .historical_trend(&key, days)
        .await
        .map_err(|e| reject(weather_error(e)))?;
    Ok(warp::reply::json(&trend))
}

async fn monthly(
    location: String,
    _caller: CallerIdentity,
    query: MonthlyQuery,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let key = decode_segment(&location)?;
    let year = match query.year {
        None => state.lookup.clock().now().year(),
        Some(raw) => raw
            .trim()
            .parse::<i32>()
            .map_err(|_| bad_request(format!("year is not a number: {}", raw)))?,
    };

    let months = state.lookup.monthly_averages(&key, year).await;
    Ok(warp::reply::json(&months))
}

async fn get_profile(caller: CallerIdentity, state: AppState) -> Result<impl Reply, Rejection> {
    let profile = state
        .profiles
        .get_profile(caller.user_id)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&profile))
}

async fn update_preferences(
    caller: CallerIdentity,
    update: PreferencesUpdate,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let prefs = state
        .profiles
        .update_preferences(caller.user_id, update)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&prefs))
}

async fn add_location(
    caller: CallerIdentity,
    location: NewLocation,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let list = state
        .profiles
        .add_location(caller.user_id, location)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&list))
}

async fn remove_location(
    name: String,
    caller: CallerIdentity,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let name = decode_segment(&name)?;
    let list = state
        .profiles
        .remove_location(caller.user_id, &name)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&list))
}

async fn set_default_location(
    name: String,
    caller: CallerIdentity,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let name = decode_segment(&name)?;
    let list = state
        .profiles
        .set_default_location(caller.user_id, &name)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&list))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("New%20York").unwrap(), "New York");
        assert_eq!(decode_segment("51.5%2C-0.12").unwrap(), "51.5,-0.12");
        assert_eq!(decode_segment("London").unwrap(), "London");
        assert!(decode_segment("%FF%FE").is_err());
    }
}
