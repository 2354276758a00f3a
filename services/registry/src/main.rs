//! keygrant revocation registry server.

use std::net::SocketAddr;

use clap::Parser;
use keygrant_registry_service::{AppState, ServiceConfig, build_router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keygrant-registry")]
#[command(about = "keygrant revocation registry")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "KEYGRANT_REGISTRY_LISTEN", default_value = "0.0.0.0:8600")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServiceConfig {
        listen_addr: args.listen,
    };

    let app = build_router(AppState::default());
    let listener = TcpListener::bind(config.listen_addr).await?;

    info!("Revocation registry listening on {}", config.listen_addr);
    axum::serve(listener, app).await
}
