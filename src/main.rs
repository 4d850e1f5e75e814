mod cache;
mod config;
mod db;
mod message;
mod routes;
mod state;
mod ws;

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use cache::TtlCache;
use config::{generate_config_template, Config};
use ws::SessionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "relay_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "relay_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Relay server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize the primary/replica SQLite pools (pre-warms the replica)
    let db = db::init_db(&config.data_dir)?;

    // Build application state
    let app_state = state::AppState {
        db,
        cache: Arc::new(TtlCache::new(Duration::from_secs(config.cache_ttl_secs))),
        sessions: SessionRegistry::new(),
        outbound_buffer: config.outbound_buffer,
        send_timeout: Duration::from_millis(config.send_timeout_ms),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
