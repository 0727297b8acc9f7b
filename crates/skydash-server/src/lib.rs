//! SkyDash HTTP API.
//!
//! Wires configuration into the weather lookup and profile store and
//! serves them over warp.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use skydash_core::Config;

pub use auth::{CallerIdentity, TokenTable};
pub use routes::routes;
pub use state::AppState;

/// Build the application and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let ip: IpAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind_address))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let state = AppState::build(&config).await?;
    if state.tokens.is_empty() {
        tracing::warn!("No API users configured; every protected route will return 401");
    }

    let janitor =
        state.spawn_cache_janitor(Duration::from_secs(config.weather.cache_ttl_secs.max(1)));

    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", bound);
    server.await;

    janitor.abort();
    tracing::info!("Server shut down");
    Ok(())
}
