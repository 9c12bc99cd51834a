use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use super::{StoreKind, TrackingStore};
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics;
use crate::models::{ContactSubmission, NewContactSubmission, NewOpenEvent, OpenEvent, OpenStats};
use crate::schema::{contact_submissions, email_opens, SQLITE_SCHEMA};

/// Embedded store backed by a single SQLite file.
///
/// Each operation opens its own connection on the blocking pool and drops it
/// before returning.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, busy_timeout_ms: u64) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        }
    }

    /// Database file this store writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection, creating the parent directory on first use
    fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Ok(conn)
    }

    /// Run `operation` against a fresh connection on the blocking pool
    async fn with_connection<T, F>(&self, name: &'static str, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let timer = OperationTimer::new(name);

        let result: Result<T> = match tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&path, busy_timeout)?;
            operation(&conn)
        })
        .await
        {
            Ok(inner) => inner,
            Err(join_error) => Err(join_error.into()),
        };

        metrics::record_store_operation(
            name,
            StoreKind::Sqlite.as_str(),
            timer.elapsed(),
            result.is_ok(),
        );
        result
    }

    /// Map a database row to an OpenEvent
    fn map_open_event(row: &Row) -> rusqlite::Result<OpenEvent> {
        let opened_at: NaiveDateTime = row.get(email_opens::OPENED_AT)?;
        Ok(OpenEvent {
            identifier: row.get(email_opens::EMAIL_ID)?,
            derived_label: row.get(email_opens::LABEL)?,
            occurred_at: opened_at.and_utc(),
            origin_address: row.get(email_opens::IP_ADDRESS)?,
            client_agent: row.get(email_opens::USER_AGENT)?,
        })
    }

    /// Map a database row to a ContactSubmission
    fn map_submission(row: &Row) -> rusqlite::Result<ContactSubmission> {
        let submitted_at: NaiveDateTime = row.get(contact_submissions::SUBMITTED_AT)?;
        Ok(ContactSubmission {
            id: row.get(contact_submissions::ID)?,
            contact_name: row.get(contact_submissions::CONTACT_NAME)?,
            contact_email: row.get(contact_submissions::CONTACT_EMAIL)?,
            organization: row.get(contact_submissions::ORGANIZATION)?,
            phone: row.get(contact_submissions::PHONE)?,
            preferred_day: row.get(contact_submissions::PREFERRED_DAY)?,
            preferred_window: row.get(contact_submissions::PREFERRED_WINDOW)?,
            submitted_at: submitted_at.and_utc(),
        })
    }
}

#[async_trait]
impl TrackingStore for SqliteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Sqlite
    }

    async fn setup_schema(&self) -> Result<()> {
        self.with_connection("setup_schema", |conn| {
            conn.execute_batch(SQLITE_SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_connection("ping", |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn insert_open_event(&self, event: &NewOpenEvent) -> Result<()> {
        let event = event.clone();
        self.with_connection("insert_open_event", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
                    email_opens::TABLE,
                    email_opens::EMAIL_ID,
                    email_opens::LABEL,
                    email_opens::IP_ADDRESS,
                    email_opens::USER_AGENT
                ),
                params![
                    event.identifier,
                    event.derived_label,
                    event.origin_address,
                    event.client_agent
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_submission(
        &self,
        submission: &NewContactSubmission,
    ) -> Result<ContactSubmission> {
        let submission = submission.clone();
        self.with_connection("insert_submission", move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    contact_submissions::TABLE,
                    contact_submissions::CONTACT_NAME,
                    contact_submissions::CONTACT_EMAIL,
                    contact_submissions::ORGANIZATION,
                    contact_submissions::PHONE,
                    contact_submissions::PREFERRED_DAY,
                    contact_submissions::PREFERRED_WINDOW
                ),
                params![
                    submission.contact_name,
                    submission.contact_email,
                    submission.organization,
                    submission.phone,
                    submission.preferred_day,
                    submission.preferred_window
                ],
            )?;

            // Get the last inserted ID
            let id = conn.last_insert_rowid();

            let stored = conn.query_row(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?1",
                    contact_submissions::TABLE,
                    contact_submissions::ID
                ),
                params![id],
                Self::map_submission,
            )?;
            Ok(stored)
        })
        .await
    }

    async fn open_stats(&self) -> Result<OpenStats> {
        self.with_connection("open_stats", |conn| {
            let (total, unique): (i64, i64) = conn.query_row(
                &format!(
                    "SELECT COUNT(*), COUNT(DISTINCT {}) FROM {}",
                    email_opens::EMAIL_ID,
                    email_opens::TABLE
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {}, {}, {}, {} FROM {} ORDER BY {} DESC, {} DESC",
                email_opens::EMAIL_ID,
                email_opens::LABEL,
                email_opens::OPENED_AT,
                email_opens::IP_ADDRESS,
                email_opens::USER_AGENT,
                email_opens::TABLE,
                email_opens::OPENED_AT,
                email_opens::ID
            ))?;
            let opens = stmt
                .query_map([], Self::map_open_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(OpenStats::new(total, unique, opens))
        })
        .await
    }
}
