//! qBittorrent WebUI Mock Server
//!
//! Standalone binary around [`mock_server::router`] for local development
//! against the operator without a real qBittorrent instance.
//!
//! Environment Variables:
//! - QBT_USERNAME: WebUI username (default: admin)
//! - QBT_PASSWORD: WebUI password (default: adminadmin)
//! - PORT: Port to listen on (default: 8080)

use mock_server::{router, MockState};
use std::env;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let username = env::var("QBT_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("QBT_PASSWORD").unwrap_or_else(|_| "adminadmin".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let app = router(MockState::new(username.clone(), password)).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🚀 qBittorrent mock server listening on {} (user {})", addr, username);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
