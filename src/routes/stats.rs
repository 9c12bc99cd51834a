//! Open statistics endpoint.

use axum::extract::State;
use axum::Json;

use crate::models::OpenStats;
use crate::state::AppState;

use super::ApiError;

/// `GET /stats`
pub(crate) async fn stats(State(state): State<AppState>) -> Result<Json<OpenStats>, ApiError> {
    let stats = state.service.stats().await?;
    tracing::debug!(
        total = stats.total_opens,
        unique = stats.unique_identifiers,
        "stats served"
    );
    Ok(Json(stats))
}
