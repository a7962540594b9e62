use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod model;

use api::{build_router, AppState};
use config::load_settings;
use model::PressureDifferentialModel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let model = PressureDifferentialModel {
        threshold: settings.leak_threshold,
    };
    let state = AppState::new(Arc::new(model), settings.signal_fields.clone());
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind_addr))?;
    info!(
        %addr,
        threshold = settings.leak_threshold,
        signal_fields = ?settings.signal_fields,
        "leak service listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
