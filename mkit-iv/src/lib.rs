//! mkit-iv library interface
//!
//! Exposes the intake pipeline and public APIs for integration testing

pub mod api;
pub mod channels;
pub mod commit;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod services;
pub mod staging;
pub mod validators;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use mkit_common::config::RulesConfig;
use mkit_common::events::EventBus;

use crate::commit::BulkCommitter;
use crate::pipeline::IntakePipeline;
use crate::review::ReviewSession;
use crate::services::{CoreSink, PhotoClient, SerialVerifier};
use crate::staging::StagingStore;
use crate::validators::Validator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Staging store over the same pool
    pub store: StagingStore,
    /// Intake funnel (normalize → validate → stage)
    pub pipeline: Arc<IntakePipeline>,
    /// Operator review sessions
    pub review: Arc<ReviewSession>,
    /// Bulk committer into the external core
    pub committer: Arc<BulkCommitter>,
    /// Photo search, when configured
    pub photos: Option<Arc<PhotoClient>>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Configured purge retention window
    pub purge_retention_days: i64,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        rules: RulesConfig,
        verifier: Option<Arc<dyn SerialVerifier>>,
        sink: Arc<dyn CoreSink>,
        photos: Option<Arc<PhotoClient>>,
    ) -> Self {
        let store = StagingStore::new(db.clone());
        let validator = Arc::new(Validator::new(rules.clone(), store.clone(), verifier));
        let pipeline = Arc::new(IntakePipeline::new(
            store.clone(),
            validator,
            event_bus.clone(),
        ));
        let review = Arc::new(ReviewSession::new(store.clone(), event_bus.clone()));
        let committer = Arc::new(BulkCommitter::new(store.clone(), sink, event_bus.clone()));

        Self {
            db,
            store,
            pipeline,
            review,
            committer,
            photos,
            event_bus,
            purge_retention_days: rules.purge_retention_days,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::intake_routes())
        .merge(api::review_routes())
        .merge(api::commit_routes())
        .merge(api::photo_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
