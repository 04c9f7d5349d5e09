//! The agent's local control API: a loopback-bound HTTP surface the embedding application
//! talks to instead of (or alongside) the in-process control channel.

pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;

use till_core::ClockSource;

use crate::catalog::CatalogCache;
use crate::config::AgentConfig;
use crate::lifecycle::{CacheVersion, ControlChannel, LifecycleController};
use crate::notify::ClientRegistry;
use crate::queue::OfflineQueue;
use crate::storage::DurableStore;

pub use handlers::{
    control_queue_handler, control_sync_handler, health_handler, liveness_handler,
    readiness_handler,
};
pub use middleware::build_http_layers;

/// Shared state carried through axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DurableStore>,
    pub queue: Arc<OfflineQueue>,
    pub catalog: Arc<CatalogCache>,
    pub clients: Arc<ClientRegistry>,
    pub control: Arc<ControlChannel>,
    pub version: Arc<CacheVersion>,
    pub lifecycle: Arc<LifecycleController>,
    pub config: Arc<AgentConfig>,
    pub clock: Arc<dyn ClockSource>,
    pub start_time: Instant,
}

/// Assembles the control-API router: health/liveness/readiness plus the control endpoints.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let layers = build_http_layers();

    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz/live", get(liveness_handler))
        .route("/healthz/ready", get(readiness_handler))
        .route("/control/sync", post(control_sync_handler))
        .route("/control/queue", get(control_queue_handler))
        .layer(layers)
        .with_state(state)
}
