use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};

use super::{StoreKind, TrackingStore};
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics;
use crate::models::{ContactSubmission, NewContactSubmission, NewOpenEvent, OpenEvent, OpenStats};
use crate::schema::POSTGRES_SCHEMA;

/// Structured store backed by PostgreSQL.
///
/// A connection is established for every operation and closed before the
/// operation returns.
#[derive(Clone)]
pub struct PostgresStore {
    url: String,
}

#[derive(FromRow)]
struct OpenEventRow {
    email_id: String,
    label: String,
    opened_at: DateTime<Utc>,
    ip_address: String,
    user_agent: String,
}

impl From<OpenEventRow> for OpenEvent {
    fn from(row: OpenEventRow) -> Self {
        Self {
            identifier: row.email_id,
            derived_label: row.label,
            occurred_at: row.opened_at,
            origin_address: row.ip_address,
            client_agent: row.user_agent,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: i64,
    contact_name: Option<String>,
    contact_email: Option<String>,
    organization: Option<String>,
    phone: Option<String>,
    preferred_day: Option<String>,
    preferred_window: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl From<SubmissionRow> for ContactSubmission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: row.id,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            organization: row.organization,
            phone: row.phone,
            preferred_day: row.preferred_day,
            preferred_window: row.preferred_window,
            submitted_at: row.submitted_at,
        }
    }
}

impl PostgresStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn connect(&self, timer: &OperationTimer, name: &'static str) -> Result<PgConnection> {
        match PgConnection::connect(&self.url).await {
            Ok(conn) => Ok(conn),
            Err(err) => {
                metrics::record_store_operation(
                    name,
                    StoreKind::Postgres.as_str(),
                    timer.elapsed(),
                    false,
                );
                Err(err.into())
            }
        }
    }

    /// Close the connection whatever the outcome and record the operation.
    async fn finish<T>(
        conn: PgConnection,
        timer: &OperationTimer,
        name: &'static str,
        result: Result<T>,
    ) -> Result<T> {
        if let Err(err) = conn.close().await {
            tracing::debug!(error = %err, operation = name, "PostgreSQL connection did not close cleanly");
        }
        metrics::record_store_operation(
            name,
            StoreKind::Postgres.as_str(),
            timer.elapsed(),
            result.is_ok(),
        );
        result
    }
}

#[async_trait]
impl TrackingStore for PostgresStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Postgres
    }

    async fn setup_schema(&self) -> Result<()> {
        const NAME: &str = "setup_schema";
        let timer = OperationTimer::new(NAME);
        let mut conn = self.connect(&timer, NAME).await?;

        let mut result = Ok(());
        for statement in POSTGRES_SCHEMA {
            if let Err(err) = sqlx::query(statement).execute(&mut conn).await {
                result = Err(err.into());
                break;
            }
        }

        Self::finish(conn, &timer, NAME, result).await
    }

    async fn ping(&self) -> Result<()> {
        const NAME: &str = "ping";
        let timer = OperationTimer::new(NAME);
        let mut conn = self.connect(&timer, NAME).await?;
        let result = conn.ping().await.map_err(Into::into);
        Self::finish(conn, &timer, NAME, result).await
    }

    async fn insert_open_event(&self, event: &NewOpenEvent) -> Result<()> {
        const NAME: &str = "insert_open_event";
        let timer = OperationTimer::new(NAME);
        let mut conn = self.connect(&timer, NAME).await?;

        let result = sqlx::query(
            "INSERT INTO email_opens (email_id, label, ip_address, user_agent)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&event.identifier)
        .bind(&event.derived_label)
        .bind(&event.origin_address)
        .bind(&event.client_agent)
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(Into::into);

        Self::finish(conn, &timer, NAME, result).await
    }

    async fn insert_submission(
        &self,
        submission: &NewContactSubmission,
    ) -> Result<ContactSubmission> {
        const NAME: &str = "insert_submission";
        let timer = OperationTimer::new(NAME);
        let mut conn = self.connect(&timer, NAME).await?;

        let result = sqlx::query_as::<_, SubmissionRow>(
            "INSERT INTO contact_submissions
                 (contact_name, contact_email, organization, phone, preferred_day, preferred_window)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, contact_name, contact_email, organization, phone,
                       preferred_day, preferred_window, submitted_at",
        )
        .bind(&submission.contact_name)
        .bind(&submission.contact_email)
        .bind(&submission.organization)
        .bind(&submission.phone)
        .bind(&submission.preferred_day)
        .bind(&submission.preferred_window)
        .fetch_one(&mut conn)
        .await
        .map(ContactSubmission::from)
        .map_err(Into::into);

        Self::finish(conn, &timer, NAME, result).await
    }

    async fn open_stats(&self) -> Result<OpenStats> {
        const NAME: &str = "open_stats";
        let timer = OperationTimer::new(NAME);
        let mut conn = self.connect(&timer, NAME).await?;

        let result = fetch_stats(&mut conn).await;

        Self::finish(conn, &timer, NAME, result).await
    }
}

async fn fetch_stats(conn: &mut PgConnection) -> Result<OpenStats> {
    let (total, unique): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT email_id) FROM email_opens")
            .fetch_one(&mut *conn)
            .await?;

    let rows = sqlx::query_as::<_, OpenEventRow>(
        "SELECT email_id, label, opened_at, ip_address, user_agent
         FROM email_opens
         ORDER BY opened_at DESC, id DESC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(OpenStats::new(
        total,
        unique,
        rows.into_iter().map(OpenEvent::from).collect(),
    ))
}
