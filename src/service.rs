use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::{self, NotificationOutcome};
use crate::models::{ContactForm, ContactSubmission, NewOpenEvent, OpenStats};
use crate::notify::{self, Notifier};
use crate::store::{StoreKind, TrackingStore};
use crate::validation::InputValidator;

/// The event pipeline: open ingestion, contact intake and aggregation.
pub struct TrackingService {
    store: Arc<dyn TrackingStore>,
    notifier: Arc<dyn Notifier>,
    notification_timeout: Duration,
}

/// A persisted submission plus its detached notification task.
pub struct SubmissionReceipt {
    /// The stored row, with its id and timestamp.
    pub submission: ContactSubmission,
    /// Dropping this handle leaves the delivery running.
    pub notification: JoinHandle<NotificationOutcome>,
}

/// Store reachability as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Backend in use.
    pub database: StoreKind,
    /// Whether a ping succeeded.
    pub reachable: bool,
}

impl TrackingService {
    /// Notification delivery is cut off after `notification_timeout`.
    pub fn new(
        store: Arc<dyn TrackingStore>,
        notifier: Arc<dyn Notifier>,
        notification_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            notification_timeout,
        }
    }

    /// Backend behind this service.
    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    /// Create the schema; repeated calls are no-ops.
    pub async fn setup(&self) -> Result<()> {
        self.store.setup_schema().await?;
        info!(database = %self.store.kind(), "schema ready");
        Ok(())
    }

    /// Ping the store. A failed ping is reported, not returned as an error.
    pub async fn health(&self) -> HealthReport {
        let reachable = match self.store.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "health check could not reach the store");
                false
            }
        };

        HealthReport {
            database: self.store.kind(),
            reachable,
        }
    }

    /// Record one pixel fetch.
    pub async fn record_open(
        &self,
        identifier: &str,
        forwarded_for: Option<&str>,
        peer: Option<IpAddr>,
        user_agent: Option<&str>,
    ) -> Result<NewOpenEvent> {
        let origin = InputValidator::resolve_client_address(forwarded_for, peer);
        let event = NewOpenEvent::from_request(identifier, &origin, user_agent.unwrap_or(""));

        self.store.insert_open_event(&event).await?;
        metrics::record_open_event();
        info!(
            identifier = %event.identifier,
            label = %event.derived_label,
            origin = %event.origin_address,
            "email open recorded"
        );

        Ok(event)
    }

    /// Persist a contact submission, then hand notification to a detached task.
    pub async fn submit_contact(&self, form: ContactForm) -> Result<SubmissionReceipt> {
        let new_submission = form.into_submission();
        let submission = self.store.insert_submission(&new_submission).await?;
        metrics::record_submission();
        info!(
            submission_id = submission.id,
            organization = submission.organization.as_deref().unwrap_or(""),
            "contact submission stored"
        );

        let notification = notify::spawn_delivery(
            Arc::clone(&self.notifier),
            submission.clone(),
            self.notification_timeout,
        );

        Ok(SubmissionReceipt {
            submission,
            notification,
        })
    }

    /// Totals and the newest open-events.
    pub async fn stats(&self) -> Result<OpenStats> {
        self.store.open_stats().await
    }
}
