//! Async front for the profile store.
//!
//! Every call runs the SQLite work on the blocking pool while holding the
//! store mutex, so the async runtime never waits on disk I/O.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ProfileError, ProfileResult};
use crate::store::SqliteProfileStore;
use crate::types::{FavoriteLocation, NewLocation, Preferences, PreferencesUpdate, UserProfile};

#[derive(Clone)]
pub struct ProfileClient {
    store: Arc<Mutex<SqliteProfileStore>>,
}

impl ProfileClient {
    pub fn new(store: SqliteProfileStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn run<T, F>(&self, op: F) -> ProfileResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteProfileStore) -> ProfileResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            op(&guard)
        })
        .await
        .map_err(|e| ProfileError::Task(e.to_string()))?
    }

    pub async fn ensure_user(&self, email: &str, password_hash: &str) -> ProfileResult<UserProfile> {
        let email = email.to_string();
        let password_hash = password_hash.to_string();
        self.run(move |store| store.ensure_user(&email, &password_hash))
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> ProfileResult<Option<UserProfile>> {
        let email = email.to_string();
        self.run(move |store| store.find_by_email(&email)).await
    }

    /// # Errors
    /// `NotFound` when the user does not exist.
    pub async fn get_profile(&self, user_id: i64) -> ProfileResult<UserProfile> {
        self.run(move |store| store.get_profile(user_id)).await
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        update: PreferencesUpdate,
    ) -> ProfileResult<Preferences> {
        self.run(move |store| store.update_preferences(user_id, &update))
            .await
    }

    /// # Errors
    /// `DuplicateLocation` if a favorite with the same name exists.
    pub async fn add_location(
        &self,
        user_id: i64,
        location: NewLocation,
    ) -> ProfileResult<Vec<FavoriteLocation>> {
        self.run(move |store| store.add_location(user_id, &location))
            .await
    }

    pub async fn remove_location(
        &self,
        user_id: i64,
        name: &str,
    ) -> ProfileResult<Vec<FavoriteLocation>> {
        let name = name.to_string();
        self.run(move |store| store.remove_location(user_id, &name))
            .await
    }

    pub async fn set_default_location(
        &self,
        user_id: i64,
        name: &str,
    ) -> ProfileResult<Vec<FavoriteLocation>> {
        let name = name.to_string();
        self.run(move |store| store.set_default_location(user_id, &name))
            .await
    }
}

impl std::fmt::Debug for ProfileClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProfileClient").finish()
    }
}
