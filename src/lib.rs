//! Outreach Tracker - Email Open Tracking and Contact Intake
//!
//! A small HTTP service for outreach campaigns: a tracking pixel that
//! records email opens, a contact form endpoint, and aggregate open
//! statistics, persisted in SQLite or PostgreSQL.
//!
//! # Features
//!
//! - Tracking pixel with per-recipient labels derived from the identifier
//! - Contact form intake (JSON or urlencoded) with best-effort email notification
//! - Open statistics and a dashboard page
//! - Storage backend selected from configuration

/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Submission notifications
pub mod notify;
/// HTTP routes
pub mod routes;
/// Database schema definitions
pub mod schema;
/// Event pipeline over a store
pub mod service;
/// Shared request handler state
pub mod state;
/// Storage backends
pub mod store;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use config::AppConfig;
pub use error::{Result, TrackerError};
pub use models::{ContactForm, ContactSubmission, NewOpenEvent, OpenEvent, OpenStats};
pub use routes::router;
pub use service::TrackingService;
pub use state::AppState;
pub use store::{open_store, StoreKind, TrackingStore};
