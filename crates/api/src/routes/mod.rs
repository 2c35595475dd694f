pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /system/status                                   model readiness (GET)
/// /generations                                     run a generation (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/system/status", get(handlers::system::get_status))
        .route("/generations", post(handlers::generation::create_generation))
}
