//! mkit-iv - Input Voucher intake service
//!
//! Sits in front of the Otomax core system and funnels four input
//! channels (CSV upload, manual form, OCR scan, AI photo parsing)
//! through one normalize → validate → stage → review → commit pipeline.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mkit_common::events::EventBus;
use mkit_iv::services::{CoreSink, OtomaxClient, OtoplusClient, PhotoClient, SerialVerifier};
use mkit_iv::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting mkit-iv (Input Voucher intake)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = mkit_iv::config::resolve_config()?;
    info!("Database: {}", config.database_path.display());

    let db_pool = mkit_iv::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let sink: Arc<dyn CoreSink> = Arc::new(
        OtomaxClient::new(&config.otomax).map_err(|e| anyhow::anyhow!("Otomax client: {}", e))?,
    );
    let verifier: Option<Arc<dyn SerialVerifier>> = match &config.otoplus {
        Some(endpoint) => {
            info!("Otoplus verification enabled: {}", endpoint.base_url);
            Some(Arc::new(
                OtoplusClient::new(endpoint)
                    .map_err(|e| anyhow::anyhow!("Otoplus client: {}", e))?,
            ))
        }
        None => {
            info!("Otoplus verification not configured; upstream check disabled");
            None
        }
    };
    let photos = match &config.photos {
        Some(endpoint) => Some(Arc::new(
            PhotoClient::new(endpoint).map_err(|e| anyhow::anyhow!("Photo client: {}", e))?,
        )),
        None => None,
    };

    let state = AppState::new(db_pool, event_bus, config.rules.clone(), verifier, sink, photos);
    let app = mkit_iv::build_router(state);

    let addr = format!("127.0.0.1:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
