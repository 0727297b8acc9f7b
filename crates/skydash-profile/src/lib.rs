//! User profiles for SkyDash: display preferences and favorite locations.

pub mod client;
pub mod error;
pub mod store;
pub mod types;

pub use client::ProfileClient;
pub use error::{ProfileError, ProfileResult};
pub use store::SqliteProfileStore;
pub use types::*;
