//! SQLite-backed user profile storage.
//!
//! `SqliteProfileStore` owns a single connection and is not `Sync`; wrap it
//! with [`ProfileClient`](crate::ProfileClient) for shared async access.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{ProfileError, ProfileResult};
use crate::types::{
    normalize_email, FavoriteLocation, NewLocation, Preferences, PreferencesUpdate, UserProfile,
};

pub struct SqliteProfileStore {
    conn: Connection,
}

impl SqliteProfileStore {
    /// Open (or create) the profile database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> ProfileResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests and throwaway instances.
    pub fn in_memory() -> ProfileResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> ProfileResult<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                temperature_unit TEXT NOT NULL DEFAULT 'C',
                speed_unit TEXT NOT NULL DEFAULT 'kph',
                theme TEXT NOT NULL DEFAULT 'light',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_locations_user ON locations(user_id, id);
            "#,
        )?;
        Ok(())
    }

    /// Read a text column through `FromStr`; unparseable values are a
    /// conversion failure, never a silent default.
    fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw: String = row.get(idx)?;
        raw.parse().map_err(|e: T::Err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("{:?}: {}", raw, e).into(),
            )
        })
    }

    fn time_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Self::parse_column::<DateTime<chrono::FixedOffset>>(row, idx)
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            preferences: Preferences {
                temperature_unit: Self::parse_column(row, 3)?,
                speed_unit: Self::parse_column(row, 4)?,
                theme: Self::parse_column(row, 5)?,
                locations: Vec::new(),
            },
            created_at: Self::time_column(row, 6)?,
            updated_at: Self::time_column(row, 7)?,
        })
    }

    fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<FavoriteLocation> {
        let is_default: i32 = row.get(3)?;
        Ok(FavoriteLocation {
            name: row.get(0)?,
            lat: row.get(1)?,
            lon: row.get(2)?,
            is_default: is_default != 0,
        })
    }

    fn locations(&self, user_id: i64) -> ProfileResult<Vec<FavoriteLocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, lat, lon, is_default FROM locations WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], Self::row_to_location)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load(&self, sql: &str, param: &dyn rusqlite::ToSql) -> ProfileResult<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(sql, [param], Self::row_to_profile)
            .optional()?;

        match profile {
            Some(mut profile) => {
                profile.preferences.locations = self.locations(profile.id)?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Fail with `NotFound` unless the user row exists.
    fn require_user(&self, user_id: i64) -> ProfileResult<()> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Err(ProfileError::not_found(user_id.to_string()));
        }
        Ok(())
    }

    fn touch(&self, user_id: i64) -> ProfileResult<()> {
        self.conn.execute(
            "UPDATE users SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), user_id],
        )?;
        Ok(())
    }

    pub fn find_by_email(&self, email: &str) -> ProfileResult<Option<UserProfile>> {
        let email = normalize_email(email);
        self.load(
            "SELECT id, email, password_hash, temperature_unit, speed_unit, theme, created_at, updated_at
             FROM users WHERE email = ?1",
            &email,
        )
    }

    /// Look up a user by id.
    ///
    /// # Errors
    /// `NotFound` when no such user exists.
    pub fn get_profile(&self, user_id: i64) -> ProfileResult<UserProfile> {
        self.load(
            "SELECT id, email, password_hash, temperature_unit, speed_unit, theme, created_at, updated_at
             FROM users WHERE id = ?1",
            &user_id,
        )?
        .ok_or_else(|| ProfileError::not_found(user_id.to_string()))
    }

    /// Insert a new user with default preferences.
    ///
    /// # Errors
    /// `Validation` for an empty or malformed email, `DuplicateEmail` when
    /// the normalized email is already registered.
    pub fn create_user(&self, email: &str, password_hash: &str) -> ProfileResult<UserProfile> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(ProfileError::validation(format!("invalid email: {:?}", email)));
        }
        if self.find_by_email(&email)?.is_some() {
            return Err(ProfileError::DuplicateEmail(email));
        }

        let now = Utc::now().to_rfc3339();
        let defaults = Preferences::default();
        self.conn.execute(
            r#"
            INSERT INTO users (email, password_hash, temperature_unit, speed_unit, theme, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                email,
                password_hash,
                defaults.temperature_unit.as_str(),
                defaults.speed_unit.as_str(),
                defaults.theme.as_str(),
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!("Created user {} ({})", id, email);
        self.get_profile(id)
    }

    /// Get-or-create by email. An existing user's hash is replaced when it
    /// differs from `password_hash`.
    pub fn ensure_user(&self, email: &str, password_hash: &str) -> ProfileResult<UserProfile> {
        match self.find_by_email(email)? {
            Some(existing) if existing.password_hash == password_hash => Ok(existing),
            Some(existing) => {
                self.conn.execute(
                    "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
                    params![password_hash, Utc::now().to_rfc3339(), existing.id],
                )?;
                tracing::debug!("Updated password hash for user {}", existing.id);
                self.get_profile(existing.id)
            }
            None => self.create_user(email, password_hash),
        }
    }

    /// Apply the fields present in `update`.
    pub fn update_preferences(
        &self,
        user_id: i64,
        update: &PreferencesUpdate,
    ) -> ProfileResult<Preferences> {
        let mut prefs = self.get_profile(user_id)?.preferences;

        if update.is_empty() {
            return Ok(prefs);
        }
        if let Some(unit) = update.temperature_unit {
            prefs.temperature_unit = unit;
        }
        if let Some(unit) = update.speed_unit {
            prefs.speed_unit = unit;
        }
        if let Some(theme) = update.theme {
            prefs.theme = theme;
        }

        self.conn.execute(
            r#"
            UPDATE users
            SET temperature_unit = ?1, speed_unit = ?2, theme = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                prefs.temperature_unit.as_str(),
                prefs.speed_unit.as_str(),
                prefs.theme.as_str(),
                Utc::now().to_rfc3339(),
                user_id,
            ],
        )?;

        tracing::debug!("Updated preferences for user {}", user_id);
        Ok(prefs)
    }

    /// Append a favorite. The first favorite a user adds becomes the default.
    ///
    /// # Errors
    /// `DuplicateLocation` when a favorite with exactly this name exists,
    /// `Validation` for an empty name or out-of-range coordinates.
    pub fn add_location(
        &self,
        user_id: i64,
        location: &NewLocation,
    ) -> ProfileResult<Vec<FavoriteLocation>> {
        validate_location(location)?;
        self.require_user(user_id)?;
        let current = self.locations(user_id)?;

        if current.iter().any(|l| l.name == location.name) {
            return Err(ProfileError::DuplicateLocation(location.name.clone()));
        }

        self.conn.execute(
            "INSERT INTO locations (user_id, name, lat, lon, is_default) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                location.name,
                location.lat,
                location.lon,
                i32::from(current.is_empty()),
            ],
        )?;
        self.touch(user_id)?;

        tracing::debug!("User {} added location {:?}", user_id, location.name);
        self.locations(user_id)
    }

    /// Drop the favorite named `name`. Absent names are a no-op.
    pub fn remove_location(&self, user_id: i64, name: &str) -> ProfileResult<Vec<FavoriteLocation>> {
        self.require_user(user_id)?;

        let removed = self.conn.execute(
            "DELETE FROM locations WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
        )?;
        if removed > 0 {
            self.touch(user_id)?;
            tracing::debug!("User {} removed location {:?}", user_id, name);
        }

        self.locations(user_id)
    }

    /// Mark `name` as the only default. With no matching entry every
    /// favorite ends up non-default.
    pub fn set_default_location(
        &self,
        user_id: i64,
        name: &str,
    ) -> ProfileResult<Vec<FavoriteLocation>> {
        self.require_user(user_id)?;

        self.conn.execute(
            "UPDATE locations SET is_default = (name = ?2) WHERE user_id = ?1",
            params![user_id, name],
        )?;
        self.touch(user_id)?;

        self.locations(user_id)
    }
}

impl std::fmt::Debug for SqliteProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProfileStore").finish_non_exhaustive()
    }
}

fn validate_location(location: &NewLocation) -> ProfileResult<()> {
    if location.name.trim().is_empty() {
        return Err(ProfileError::validation("location name is empty"));
    }
    if !(-90.0..=90.0).contains(&location.lat) {
        return Err(ProfileError::validation(format!("latitude out of range: {}", location.lat)));
    }
    if !(-180.0..=180.0).contains(&location.lon) {
        return Err(ProfileError::validation(format!("longitude out of range: {}", location.lon)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::types::{SpeedUnit, TemperatureUnit, Theme};

    fn create_test_store() -> SqliteProfileStore {
        SqliteProfileStore::in_memory().expect("Failed to create in-memory store")
    }

    fn loc(name: &str) -> NewLocation {
        NewLocation {
            name: name.to_string(),
            lat: 51.5,
            lon: -0.12,
        }
    }

    #[test]
    fn test_create_user_with_defaults() {
        let store = create_test_store();

        let user = store.create_user(" Alice@Example.com ", "hash").unwrap();

        assert!(user.id > 0);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.preferences, Preferences::default());
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        use skydash_core::DatabaseError;

        let store = create_test_store();
        let user = store.create_user("carol@example.com", "hash").unwrap();

        store
            .conn
            .execute("UPDATE users SET theme = 'neon' WHERE id = ?1", params![user.id])
            .unwrap();
        let result = store.get_profile(user.id);
        assert!(matches!(
            result,
            Err(ProfileError::Database(DatabaseError::Corruption(_)))
        ));

        store
            .conn
            .execute(
                "UPDATE users SET theme = 'dark', created_at = 'yesterday' WHERE id = ?1",
                params![user.id],
            )
            .unwrap();
        let result = store.get_profile(user.id);
        assert!(matches!(
            result,
            Err(ProfileError::Database(DatabaseError::Corruption(_)))
        ));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = create_test_store();
        store.create_user("alice@example.com", "hash").unwrap();

        let result = store.create_user("ALICE@example.com", "other");
        assert!(matches!(result, Err(ProfileError::DuplicateEmail(_))));
    }

    #[test]
    fn test_invalid_email_rejected() {
        let store = create_test_store();
        assert!(matches!(
            store.create_user("   ", "hash"),
            Err(ProfileError::Validation(_))
        ));
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let store = create_test_store();

        let first = store.ensure_user("bob@example.com", "h1").unwrap();
        let second = store.ensure_user("bob@example.com", "h1").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            store.find_by_email("bob@example.com").unwrap().map(|u| u.id),
            Some(first.id)
        );

        let rehashed = store.ensure_user("bob@example.com", "h2").unwrap();
        assert_eq!(rehashed.id, first.id);
        assert_eq!(rehashed.password_hash, "h2");
    }

    #[test]
    fn test_get_missing_profile() {
        let store = create_test_store();
        assert!(matches!(store.get_profile(42), Err(ProfileError::NotFound(_))));
    }

    #[test]
    fn test_partial_preference_update() {
        let store = create_test_store();
        let user = store.create_user("c@example.com", "h").unwrap();

        let prefs = store
            .update_preferences(
                user.id,
                &PreferencesUpdate {
                    theme: Some(Theme::Dark),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.temperature_unit, TemperatureUnit::C);

        let prefs = store
            .update_preferences(
                user.id,
                &PreferencesUpdate {
                    temperature_unit: Some(TemperatureUnit::F),
                    speed_unit: Some(SpeedUnit::Mph),
                    theme: None,
                },
            )
            .unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.speed_unit, SpeedUnit::Mph);

        let stored = store.get_profile(user.id).unwrap();
        assert_eq!(stored.preferences.temperature_unit, TemperatureUnit::F);
    }

    #[test]
    fn test_first_location_becomes_default() {
        let store = create_test_store();
        let user = store.create_user("d@example.com", "h").unwrap();

        store.add_location(user.id, &loc("Home")).unwrap();
        let list = store.add_location(user.id, &loc("Work")).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Home");
        assert!(list[0].is_default);
        assert!(!list[1].is_default);
    }

    #[test]
    fn test_duplicate_location_rejected() {
        let store = create_test_store();
        let user = store.create_user("e@example.com", "h").unwrap();
        store.add_location(user.id, &loc("Home")).unwrap();

        let result = store.add_location(user.id, &loc("Home"));
        assert!(matches!(result, Err(ProfileError::DuplicateLocation(_))));

        // Names match case-sensitively
        let list = store.add_location(user.id, &loc("home")).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_same_name_allowed_for_different_users() {
        let store = create_test_store();
        let a = store.create_user("a@example.com", "h").unwrap();
        let b = store.create_user("b@example.com", "h").unwrap();

        store.add_location(a.id, &loc("Home")).unwrap();
        let list = store.add_location(b.id, &loc("Home")).unwrap();
        assert!(list[0].is_default);
    }

    #[test]
    fn test_location_validation() {
        let store = create_test_store();
        let user = store.create_user("f@example.com", "h").unwrap();

        let bad = NewLocation {
            name: "Nowhere".into(),
            lat: 91.0,
            lon: 0.0,
        };
        assert!(matches!(
            store.add_location(user.id, &bad),
            Err(ProfileError::Validation(_))
        ));
        assert!(matches!(
            store.add_location(user.id, &loc("  ")),
            Err(ProfileError::Validation(_))
        ));
    }

    #[test]
    fn test_add_location_unknown_user() {
        let store = create_test_store();
        assert!(matches!(
            store.add_location(9, &loc("Home")),
            Err(ProfileError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_location() {
        let store = create_test_store();
        let user = store.create_user("g@example.com", "h").unwrap();
        store.add_location(user.id, &loc("Home")).unwrap();
        store.add_location(user.id, &loc("Work")).unwrap();

        let list = store.remove_location(user.id, "Home").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Work");

        let unchanged = store.remove_location(user.id, "Gym").unwrap();
        assert_eq!(unchanged, list);
    }

    #[test]
    fn test_set_default_location() {
        let store = create_test_store();
        let user = store.create_user("h@example.com", "h").unwrap();
        store.add_location(user.id, &loc("Home")).unwrap();
        store.add_location(user.id, &loc("Work")).unwrap();
        store.add_location(user.id, &loc("Cabin")).unwrap();

        let list = store.set_default_location(user.id, "Work").unwrap();
        let defaults: Vec<&str> = list
            .iter()
            .filter(|l| l.is_default)
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(defaults, vec!["Work"]);

        let list = store.set_default_location(user.id, "Atlantis").unwrap();
        assert!(list.iter().all(|l| !l.is_default));
    }

    #[test]
    fn test_profile_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");

        let id = {
            let store = SqliteProfileStore::new(&path).unwrap();
            let user = store.create_user("i@example.com", "h").unwrap();
            store.add_location(user.id, &loc("Home")).unwrap();
            user.id
        };

        let store = SqliteProfileStore::new(&path).unwrap();
        let profile = store.get_profile(id).unwrap();
        assert_eq!(profile.preferences.locations.len(), 1);
    }
}
