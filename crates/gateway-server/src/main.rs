//! Gateway server binary: loads configuration, wires C1-C10, and serves
//! the JSON API and `.strm` redirect endpoint over HTTP.
//!
//! Bootstrap sequence: config -> tracing -> state -> router -> serve, with
//! graceful shutdown triggered by a `tokio_util::sync::CancellationToken`
//! off a `ctrl_c` handler.

use std::net::SocketAddr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gateway_core::config::Config;
use gateway_server::http;
use gateway_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_or_default(&Config::default_path());

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    for err in config.validate() {
        tracing::warn!(%err, "configuration validation issue");
    }

    let bind_addr: SocketAddr = config.server.bind_addr.parse()?;
    let state = AppState::build(config).await?;
    state.spawn_background_loops().await?;
    let shutdown = state.shutdown.clone();

    let app = http::create_app(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "streaming-url gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
