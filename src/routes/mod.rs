//! HTTP route definitions.

mod contact;
mod dashboard;
mod error;
mod health;
mod stats;
mod track;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub use self::error::ApiError;
pub use self::track::PIXEL_GIF;

/// Build the complete router.
///
/// # Route Structure
///
/// - `GET /` - Dashboard page (external template)
/// - `GET /track/{identifier}.gif` - Tracking pixel, records an open
/// - `GET /stats` - Open counts, average and listing
/// - `POST /formulario` - Contact form intake (JSON or urlencoded)
/// - `GET /health` - Health check with store kind
/// - `GET /setup-db` - Idempotent schema creation
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/track/{file}", get(track::track_pixel))
        .route("/stats", get(stats::stats))
        .route("/formulario", post(contact::submit_form))
        .route("/health", get(health::health_check))
        .route("/setup-db", get(health::setup_db))
        .with_state(state)
}
