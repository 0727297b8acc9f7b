use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    C,
    F,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    #[default]
    Kph,
    Mph,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::F => "F",
        }
    }
}

impl SpeedUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kph => "kph",
            Self::Mph => "mph",
        }
    }
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "C" => Ok(Self::C),
            "F" => Ok(Self::F),
            other => Err(format!("unknown temperature unit: {}", other)),
        }
    }
}

impl FromStr for SpeedUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kph" => Ok(Self::Kph),
            "mph" => Ok(Self::Mph),
            other => Err(format!("unknown speed unit: {}", other)),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// A saved location on the user's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub temperature_unit: TemperatureUnit,
    pub speed_unit: SpeedUnit,
    pub theme: Theme,
    /// Insertion order
    pub locations: Vec<FavoriteLocation>,
}

/// A user record as returned to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    /// Set by the external auth system; never sent back out.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial preference update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub temperature_unit: Option<TemperatureUnit>,
    #[serde(default)]
    pub speed_unit: Option<SpeedUnit>,
    #[serde(default)]
    pub theme: Option<Theme>,
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.temperature_unit.is_none() && self.speed_unit.is_none() && self.theme.is_none()
    }
}

/// Request body for adding a favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Normalize an email the way the users table stores it.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_preferences_wire_names() {
        let prefs = Preferences {
            locations: vec![FavoriteLocation {
                name: "Home".into(),
                lat: 51.5,
                lon: -0.12,
                is_default: true,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["temperatureUnit"], "C");
        assert_eq!(json["speedUnit"], "kph");
        assert_eq!(json["theme"], "light");
        assert_eq!(json["locations"][0]["isDefault"], true);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let profile = UserProfile {
            id: 1,
            email: "a@example.com".into(),
            password_hash: "$2b$10$secret".into(),
            preferences: Preferences::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let text = serde_json::to_string(&profile).unwrap();
        assert!(!text.contains("secret"));
        assert!(!text.contains("password"));
    }

    #[test]
    fn test_partial_update_parses() {
        let update: PreferencesUpdate =
            serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(update.theme, Some(Theme::Dark));
        assert!(update.temperature_unit.is_none());
        assert!(!update.is_empty());
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let result: Result<PreferencesUpdate, _> =
            serde_json::from_str(r#"{"temperatureUnit":"K"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unit_strings_round_trip_through_storage_form() {
        assert_eq!("mph".parse::<SpeedUnit>().unwrap(), SpeedUnit::Mph);
        assert_eq!(Theme::Dark.as_str(), "dark");
        assert!("kelvin".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
