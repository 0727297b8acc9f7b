use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite databases (weather cache, profiles)
    pub data_dir: PathBuf,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Weather provider and cache settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Bearer tokens accepted by the API
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, e.g. "127.0.0.1" or "0.0.0.0"
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the weatherapi.com-compatible provider
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Provider API key (can be set via WEATHER_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Validity window of both cache tiers, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound for a single provider request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of forecast days requested on a cache miss
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Request air quality data along with the forecast
    #[serde(default = "default_air_quality")]
    pub air_quality: bool,
}

fn default_api_base_url() -> String {
    "http://api.weatherapi.com/v1".to_string()
}

/// Longest accepted cache TTL (30 days).
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 86_400;

fn default_cache_ttl_secs() -> u64 {
    1800
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_forecast_days() -> u8 {
    7
}

fn default_air_quality() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            forecast_days: default_forecast_days(),
            air_quality: default_air_quality(),
        }
    }
}

/// A caller known to the API: the token maps to the user's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub email: String,
    pub token: String,
    /// Hash produced by the external auth system; stored opaquely
    #[serde(default)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<ApiUser>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skydash");

        Self {
            data_dir,
            server: ServerConfig::default(),
            weather: WeatherConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating a default file if missing.
    ///
    /// Environment overrides are applied after the file is read and are
    /// never written back.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;

            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()))
                .context("Configuration validation failed");
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("WEATHER_API_KEY") {
            if !key.is_empty() {
                self.weather.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("WEATHER_API_BASE_URL") {
            if !url.is_empty() {
                self.weather.api_base_url = url;
            }
        }
        if let Ok(port) = std::env::var("SKYDASH_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid SKYDASH_PORT: {}", port),
            }
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_base_url, "weather.api_base_url", &mut result);

        if self
            .weather
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            result.add_warning(
                "weather.api_key",
                "No weather API key configured - provider requests will be rejected",
            );
        }

        if self.weather.cache_ttl_secs == 0 {
            result.add_error("weather.cache_ttl_secs", "Cache TTL must be greater than 0");
        } else if self.weather.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            result.add_error(
                "weather.cache_ttl_secs",
                format!("Cache TTL must be at most {} seconds", MAX_CACHE_TTL_SECS),
            );
        } else if self.weather.cache_ttl_secs > 86_400 {
            result.add_warning(
                "weather.cache_ttl_secs",
                "Cache TTL is more than 24 hours",
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.weather.forecast_days == 0 {
            result.add_error("weather.forecast_days", "Forecast days must be greater than 0");
        } else if self.weather.forecast_days > 14 {
            result.add_warning(
                "weather.forecast_days",
                "Provider forecasts are limited to 14 days",
            );
        }

        if self.server.port == 0 {
            result.add_error("server.port", "Port cannot be 0");
        }

        if self.server.bind_address.parse::<std::net::IpAddr>().is_err() {
            result.add_error(
                "server.bind_address",
                format!("Not an IP address: {}", self.server.bind_address),
            );
        }

        let mut seen_tokens = HashSet::new();
        for (i, user) in self.auth.users.iter().enumerate() {
            let field = format!("auth.users[{}]", i);
            if user.token.trim().is_empty() {
                result.add_error(&field, "Token cannot be empty");
            } else if !seen_tokens.insert(user.token.as_str()) {
                result.add_error(&field, "Token is assigned to more than one user");
            }
            if user.email.trim().is_empty() {
                result.add_error(&field, "Email cannot be empty");
            }
        }

        if self.auth.users.is_empty() {
            result.add_warning("auth.users", "No API users configured - every request will get 401");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Path of the persisted weather cache database
    pub fn weather_cache_path(&self) -> PathBuf {
        self.data_dir.join("weather_cache.db")
    }

    /// Path of the profile database
    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.db")
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skydash");

        Ok(config_dir.join("config.toml"))
    }
}
