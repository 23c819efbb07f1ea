use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::load_config;
use crate::server::dto::ACCESS_HINT;
use crate::server::{create_router, AppState};
use crate::usage::UsageCache;
use crate::warehouse::{SqlApiClient, WarehouseSession};

/// Start the dashboard server
pub async fn run(port: Option<u16>, open_browser: bool) -> Result<()> {
    let config = load_config()?;

    let session = WarehouseSession::acquire(&config)
        .with_context(|| format!("Failed to acquire a warehouse session. {}", ACCESS_HINT))?;
    eprintln!("[tokenlens] Connected as {}", session.identity());

    let session_key = session.identity().to_string();
    let executor = SqlApiClient::new(session).context("Failed to build the SQL API client")?;

    let cache = UsageCache::new(Duration::from_secs(config.cache.ttl_secs));
    eprintln!(
        "[tokenlens] Caching usage data for {}s per session",
        cache.ttl().as_secs()
    );

    let state = Arc::new(AppState {
        executor: Arc::new(executor),
        cache,
        session_key,
    });

    let port = port.unwrap_or(config.server.port);
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let url = format!("http://{}", addr);
    eprintln!("[tokenlens] Dashboard running at {}", url);

    if open_browser {
        if let Err(e) = open::that(&url) {
            eprintln!("[tokenlens] Could not open browser: {}", e);
        }
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    eprintln!("[tokenlens] Shutting down");
}
