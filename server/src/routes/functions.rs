//! Cloud function endpoint.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::AppState;

/// Function call response.
#[derive(Serialize)]
pub struct FunctionResponse {
    pub result: Value,
}

/// Create function routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/functions/{name}", post(run_function))
}

/// POST /functions/{name} - Run a function defined on the engine.
async fn run_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<Value>,
) -> Result<Json<FunctionResponse>> {
    tracing::debug!(function = %name, "running function");
    let result = state.cloud.run_function(&name, params).await?;
    Ok(Json(FunctionResponse { result }))
}
