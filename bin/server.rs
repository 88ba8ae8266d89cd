// Coin Pot - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use coin_pot::api::{router, AppState};
use coin_pot::{init_logging, open_database, Config};
use tracing::info;

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(&config);

    let conn = open_database(&config.db_path)?;
    info!(db = %config.db_path.display(), "database opened");

    let app = router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "coin pot server listening");

    axum::serve(listener, app)
        .await
        .context("Server exited with an error")?;

    Ok(())
}
