//! Weather lookup for SkyDash
//!
//! Resolves a location key to provider weather data through a two-tier
//! cache (in-process, then SQLite) with upstream fallback, plus the
//! historical analytics built on top of single-date lookups.

pub mod analytics;
pub mod cache;
pub mod clock;
pub mod lookup;
pub mod provider;
pub mod store;
pub mod types;

pub use types::*;
pub use cache::LocalCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use lookup::{LookupSettings, WeatherLookup};
pub use provider::{WeatherApiClient, WeatherProvider};
pub use store::{DurableCache, SqliteWeatherCache};
