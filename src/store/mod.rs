//! Storage backends for open-events and contact submissions.
//!
//! Both backends share the [`TrackingStore`] contract and open a fresh
//! connection per operation; nothing is pooled and no transaction spans more
//! than one operation.

mod postgres;
mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::error::{Result, TrackerError};
use crate::models::{ContactSubmission, NewContactSubmission, NewOpenEvent, OpenStats};

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

/// Which backend a store talks to; reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Local file database.
    Sqlite,
    /// Server selected by a connection URL.
    Postgres,
}

impl StoreKind {
    /// Name used in health responses and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgresql",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence contract shared by the SQLite and PostgreSQL backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Backend identity.
    fn kind(&self) -> StoreKind;

    /// Create both tables if missing. Safe to call repeatedly.
    async fn setup_schema(&self) -> Result<()>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;

    /// Append one open-event.
    async fn insert_open_event(&self, event: &NewOpenEvent) -> Result<()>;

    /// Persist one submission and return it with its id and timestamp.
    async fn insert_submission(&self, submission: &NewContactSubmission)
        -> Result<ContactSubmission>;

    /// Counts, average and the newest-first listing of open-events.
    async fn open_stats(&self) -> Result<OpenStats>;
}

/// Backend selected from the configured connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Sqlite(PathBuf),
    Postgres(String),
}

impl StoreTarget {
    /// No URL selects the embedded store at `sqlite_path`; `postgres://` and
    /// `postgresql://` select the structured store; `sqlite:` URLs point the
    /// embedded store elsewhere.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let Some(url) = config.url.as_deref().map(str::trim) else {
            return Ok(Self::Sqlite(PathBuf::from(&config.sqlite_path)));
        };

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres(url.to_string()));
        }

        if let Some(path) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                return Err(TrackerError::Config("sqlite URL has no path".to_string()));
            }
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }

        Err(TrackerError::Config(format!(
            "unsupported database URL scheme in {:?}",
            redact_url(url)
        )))
    }
}

/// Build the store selected by configuration.
pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn TrackingStore>> {
    let store: Arc<dyn TrackingStore> = match StoreTarget::from_config(config)? {
        StoreTarget::Sqlite(path) => {
            tracing::info!(path = %path.display(), "using embedded SQLite store");
            Arc::new(SqliteStore::new(path, config.busy_timeout_ms))
        }
        StoreTarget::Postgres(url) => {
            tracing::info!(url = %redact_url(&url), "using PostgreSQL store");
            Arc::new(PostgresStore::new(url))
        }
    };
    Ok(store)
}

/// Hide credentials in a connection string before it reaches a log line.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
