//! peerbrief web server
//!
//! Run with: cargo run -p peerbrief-web

use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use peerbrief_web::state::{AppState, WebConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("peerbrief=debug,info")),
        )
        .init();

    info!("Starting peerbrief web server...");

    let config = WebConfig::from_env()?;
    info!("📂 Collection runs: {}", config.collection_dir.display());
    info!("⚙️  Pipeline: {} (in {})", config.synth_command_line(), config.pipeline_dir.display());

    let port = config.port;
    let app = peerbrief_web::router::build_router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 Server listening on http://{}", addr);
    info!("📱 Open your browser and navigate to http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
