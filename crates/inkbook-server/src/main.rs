//! InkBook Page Server
//!
//! Persists notebook pages over HTTP.
//!
//! ## Routes
//!
//! - `GET /api/pages/load?document_id=ID` returns `{ "pages": [...] }`
//! - `POST /api/pages/save` with `{ "document_id": ..., "pages": [...] }`
//! - `GET /health`
//!
//! `INKBOOK_ADDR` sets the listen address and `INKBOOK_DATA_DIR` the storage
//! directory.

mod api;

use api::AppState;
use inkbook_core::{FilePageStorage, SaveConfig, SaveCoordinator};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkbook_server=info,inkbook_core=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let storage = match std::env::var_os("INKBOOK_DATA_DIR") {
        Some(dir) => FilePageStorage::new(PathBuf::from(dir))?,
        None => FilePageStorage::default_location()?,
    };
    info!("Storing pages under {}", storage.base_path().display());

    let state = Arc::new(AppState::new(SaveCoordinator::new(
        Arc::new(storage),
        SaveConfig::default(),
    )));

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = std::env::var("INKBOOK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    info!("InkBook page server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
