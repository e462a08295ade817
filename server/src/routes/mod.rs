//! HTTP route definitions.

mod functions;
mod health;
mod schemas;
mod status;

use crate::AppState;
use axum::Router;

/// Routes served by the standalone binary.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(status::routes())
        .merge(schemas::routes())
}

/// `POST /functions/{name}`.
///
/// Functions are defined in code on the engine instance, which the binary
/// never does, so only hosts embedding the server mount these.
pub fn function_routes() -> Router<AppState> {
    functions::routes()
}
