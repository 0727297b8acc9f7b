//! Bearer token identification.
//!
//! Tokens come from `[[auth.users]]` in the config file. Each configured
//! user is ensured in the profile store when the table is built.

use std::collections::HashMap;
use std::sync::Arc;

use skydash_core::{AppError, AuthConfig, AuthError};
use skydash_profile::{ProfileClient, ProfileResult};
use warp::{Filter, Rejection};

use crate::error::reject;

/// The authenticated caller attached to every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub email: String,
}

#[derive(Default)]
pub struct TokenTable {
    callers: HashMap<String, CallerIdentity>,
}

impl TokenTable {
    /// Ensure each configured user exists and index them by token.
    pub async fn seed(auth: &AuthConfig, profiles: &ProfileClient) -> ProfileResult<Self> {
        let mut callers = HashMap::with_capacity(auth.users.len());

        for user in &auth.users {
            let profile = profiles
                .ensure_user(&user.email, &user.password_hash)
                .await?;
            callers.insert(
                user.token.clone(),
                CallerIdentity {
                    user_id: profile.id,
                    email: profile.email,
                },
            );
        }

        tracing::info!("Loaded {} API token(s)", callers.len());
        Ok(Self { callers })
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Resolve an `Authorization` header value.
    ///
    /// # Errors
    /// `MissingToken` for an absent or non-bearer header, `InvalidToken`
    /// for a token not in the table.
    pub fn identify(&self, authorization: Option<&str>) -> Result<CallerIdentity, AuthError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;

        self.callers
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

impl FromIterator<(String, CallerIdentity)> for TokenTable {
    fn from_iter<I: IntoIterator<Item = (String, CallerIdentity)>>(iter: I) -> Self {
        Self {
            callers: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print tokens
        f.debug_struct("TokenTable")
            .field("callers", &self.callers.len())
            .finish()
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Filter extracting the caller, rejecting with 401 when unidentified.
pub fn with_caller(
    tokens: Arc<TokenTable>,
) -> impl Filter<Extract = (CallerIdentity,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::any().map(move || tokens.clone()))
        .and_then(
            |header: Option<String>, tokens: Arc<TokenTable>| async move {
                tokens
                    .identify(header.as_deref())
                    .map_err(|e| reject(AppError::Auth(e)))
            },
        )
}
