//! The web front end: a single upload page backed by a small JSON API.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;

use anyhow::{Context, Result};

/// Binds the listener and serves the front end until shutdown.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr, "front end listening");
    axum::serve(listener, routes::router(state))
        .await
        .context("server terminated")?;

    Ok(())
}
