//! Health check and schema setup endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

use super::ApiError;

/// Health check response.
#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    /// `ok` when the store answered a ping, `unavailable` otherwise.
    pub(crate) status: &'static str,
    pub(crate) database: &'static str,
    pub(crate) version: &'static str,
}

/// `GET /health`
///
/// Always answers 200; store reachability is carried in `status`.
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.service.health().await;

    Json(HealthResponse {
        status: if report.reachable { "ok" } else { "unavailable" },
        database: report.database.as_str(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct SetupResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
}

/// `GET /setup-db`
pub(crate) async fn setup_db(State(state): State<AppState>) -> Result<Json<SetupResponse>, ApiError> {
    state.service.setup().await?;

    Ok(Json(SetupResponse {
        success: true,
        message: format!("{} schema is ready", state.service.store_kind()),
    }))
}
