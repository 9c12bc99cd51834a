//! Application state shared with request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::TrackingService;

/// Shared application state available to all request handlers.
///
/// Built once at startup; handlers only read from it.
#[derive(Clone)]
pub struct AppState {
    /// Event pipeline over the selected store.
    pub service: Arc<TrackingService>,

    /// Application configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new application state from configuration and service.
    pub fn new(config: AppConfig, service: TrackingService) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}
