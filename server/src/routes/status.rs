//! Setup status endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::startup::SetupStatus;
use crate::AppState;

/// Create status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

/// GET /status - Outcome of the startup reconciliation.
async fn status(State(state): State<AppState>) -> Json<SetupStatus> {
    Json(state.status.read().await.clone())
}
