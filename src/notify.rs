//! Best-effort email notification for new contact submissions.
//!
//! Delivery runs on a detached task bounded by a timeout. Its outcome is
//! logged and counted but never reaches the submitting client: once a
//! submission is persisted it is successful regardless of notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::NotificationConfig;
use crate::error::{Result, TrackerError};
use crate::metrics::{self, NotificationOutcome};
use crate::models::ContactSubmission;
use crate::validation::{truncate_chars, InputValidator};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether deliveries should be attempted at all.
    fn is_enabled(&self) -> bool;

    /// Deliver one notification for a stored submission.
    async fn notify(&self, submission: &ContactSubmission) -> Result<()>;
}

/// Notifier used when notifications are switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn notify(&self, _submission: &ContactSubmission) -> Result<()> {
        Ok(())
    }
}

/// Sends notifications through an EmailJS-compatible HTTP email API.
pub struct EmailApiNotifier {
    client: reqwest::Client,
    config: NotificationConfig,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: TemplateParams<'a>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct TemplateParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    contact_name: &'a str,
    contact_email: &'a str,
    organization: &'a str,
    phone: &'a str,
    preferred_day: &'a str,
    preferred_window: &'a str,
    submitted_at: String,
}

impl<'a> TemplateParams<'a> {
    fn new(submission: &'a ContactSubmission, recipient: Option<&'a str>) -> Self {
        let text = |value: &'a Option<String>| value.as_deref().unwrap_or("");
        Self {
            to_email: recipient,
            reply_to: submission
                .contact_email
                .as_deref()
                .filter(|email| InputValidator::is_plausible_email(email)),
            contact_name: text(&submission.contact_name),
            contact_email: text(&submission.contact_email),
            organization: text(&submission.organization),
            phone: text(&submission.phone),
            preferred_day: text(&submission.preferred_day),
            preferred_window: text(&submission.preferred_window),
            submitted_at: submission.submitted_at.to_rfc3339(),
        }
    }
}

impl EmailApiNotifier {
    pub fn new(config: NotificationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("outreach-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Notification(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for EmailApiNotifier {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn notify(&self, submission: &ContactSubmission) -> Result<()> {
        let body = EmailRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            access_token: self.config.private_key.as_deref(),
            template_params: TemplateParams::new(submission, self.config.recipient.as_deref()),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(TrackerError::Notification(format!(
            "email API responded {status}: {}",
            truncate_chars(detail.trim(), 200)
        )))
    }
}

/// Build the notifier selected by configuration.
pub fn build_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    if config.enabled {
        tracing::info!(endpoint = %config.endpoint, "email notifications enabled");
        Ok(Arc::new(EmailApiNotifier::new(config.clone())?))
    } else {
        tracing::info!("email notifications disabled");
        Ok(Arc::new(DisabledNotifier))
    }
}

/// Attempt one delivery within `timeout`, logging and counting the outcome.
pub async fn deliver(
    notifier: &dyn Notifier,
    submission: &ContactSubmission,
    timeout: Duration,
) -> NotificationOutcome {
    let outcome = if !notifier.is_enabled() {
        NotificationOutcome::Skipped
    } else {
        match tokio::time::timeout(timeout, notifier.notify(submission)).await {
            Ok(Ok(())) => {
                tracing::info!(submission_id = submission.id, "submission notification sent");
                NotificationOutcome::Sent
            }
            Ok(Err(err)) => {
                tracing::warn!(submission_id = submission.id, error = %err, "submission notification failed");
                NotificationOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    submission_id = submission.id,
                    timeout_secs = timeout.as_secs(),
                    "submission notification timed out"
                );
                NotificationOutcome::TimedOut
            }
        }
    };

    metrics::record_notification(outcome);
    outcome
}

/// Run [`deliver`] on a detached task. Dropping the handle does not cancel it.
pub fn spawn_delivery(
    notifier: Arc<dyn Notifier>,
    submission: ContactSubmission,
    timeout: Duration,
) -> JoinHandle<NotificationOutcome> {
    tokio::spawn(async move { deliver(notifier.as_ref(), &submission, timeout).await })
}
