//! Dashboard page served from an external template file.

use std::io::ErrorKind;

use axum::extract::State;
use axum::response::Html;

use crate::error::TrackerError;
use crate::state::AppState;

use super::ApiError;

/// `GET /`
///
/// The template is read on every request so it can be edited without a
/// restart. The page itself pulls its data from `/stats`.
pub(crate) async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let path = &state.config.dashboard.template_path;

    match tokio::fs::read_to_string(path).await {
        Ok(page) => Ok(Html(page)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path, "dashboard template missing");
            Err(ApiError::NotFound("dashboard template".to_string()))
        }
        Err(err) => Err(ApiError::Internal(TrackerError::Io(err))),
    }
}
