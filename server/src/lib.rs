//! Converge Server - reconciles declared schemas against a remote store.
//!
//! On boot the server loads the schema declarations, starts reconciliation in
//! the background and serves HTTP right away. The outcome of the pass is
//! exposed at `/status`; a failed pass leaves the server running in a
//! degraded state rather than exiting.

pub mod config;
pub mod declarations;
pub mod error;
pub mod routes;
pub mod startup;
pub mod store;

use crate::startup::SetupStatus;
use axum::Router;
use converge_engine::Cloud;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub cloud: Arc<Cloud>,
    pub status: Arc<RwLock<SetupStatus>>,
    pub instance_id: Uuid,
}

impl AppState {
    pub fn new(cloud: Arc<Cloud>) -> Self {
        Self {
            cloud,
            status: Arc::new(RwLock::new(SetupStatus::pending())),
            instance_id: Uuid::new_v4(),
        }
    }
}

/// Build the router served by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router for a host that embeds the server and defines functions
/// on `state.cloud`: everything [`app`] serves plus `POST /functions/{name}`.
pub fn app_with_functions(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .merge(routes::function_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
