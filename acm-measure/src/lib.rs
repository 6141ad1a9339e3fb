//! acm-measure library interface
//!
//! Task framework, batch acoustic measurement pipeline, SQLite-backed
//! collaborators, and the HTTP API that ties them together.

pub mod api;
pub mod db;
pub mod error;
pub mod measure;
pub mod tasks;

pub use crate::error::{ApiError, ApiResult};

use acm_common::config::MeasurementDefaults;
use acm_common::events::EventBus;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::measure::{AttributeStore, MediaLocator, ScriptRunner};
use crate::tasks::TaskRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
    /// Event bus for SSE broadcasting (shared with the registry)
    pub event_bus: EventBus,
    pub attributes: Arc<dyn AttributeStore>,
    pub media: Arc<dyn MediaLocator>,
    pub runner: Arc<dyn ScriptRunner>,
    pub defaults: MeasurementDefaults,
    /// Where `POST /measure` looks for input files
    pub uploads_dir: PathBuf,
    /// Where output CSVs are written
    pub results_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        registry: TaskRegistry,
        attributes: Arc<dyn AttributeStore>,
        media: Arc<dyn MediaLocator>,
        runner: Arc<dyn ScriptRunner>,
        defaults: MeasurementDefaults,
        root_folder: PathBuf,
    ) -> Self {
        Self {
            event_bus: registry.events().clone(),
            registry,
            attributes,
            media,
            runner,
            defaults,
            uploads_dir: root_folder.join("uploads"),
            results_dir: root_folder.join("results"),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::measure_routes())
        .merge(api::task_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
