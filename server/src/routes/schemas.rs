//! Declared schema endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use converge_engine::{ClassName, SchemaDefinition};

use crate::error::{AppError, Result};
use crate::AppState;

/// Create schema routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/schemas", get(list_schemas))
        .route("/schemas/{class_name}", get(get_schema))
}

/// GET /schemas - Names of every declared class.
async fn list_schemas(State(state): State<AppState>) -> Json<Vec<ClassName>> {
    Json(state.cloud.schemas().class_names())
}

/// GET /schemas/{class_name} - One declared class.
async fn get_schema(
    State(state): State<AppState>,
    Path(class_name): Path<String>,
) -> Result<Json<SchemaDefinition>> {
    state
        .cloud
        .schemas()
        .get(&class_name)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Class {class_name} is not declared")))
}
