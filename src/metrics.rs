use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names recorded by the service.
pub mod names {
    /// Counter of stored open-events.
    pub const OPEN_EVENTS_TOTAL: &str = "outreach_open_events_total";
    /// Counter of stored contact submissions.
    pub const SUBMISSIONS_TOTAL: &str = "outreach_submissions_total";
    /// Counter of notification attempts, labelled by `status`.
    pub const NOTIFICATIONS_TOTAL: &str = "outreach_notifications_total";
    /// Counter of store calls, labelled by `operation`.
    pub const STORE_OPERATIONS_TOTAL: &str = "outreach_store_operations_total";
    /// Histogram of store call latency.
    pub const STORE_OPERATION_DURATION: &str = "outreach_store_operation_duration_seconds";
}

/// Outcome label for a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The provider accepted the message.
    Sent,
    /// Transport error or non-success status.
    Failed,
    /// No answer within the configured timeout.
    TimedOut,
    /// Notifications are disabled.
    Skipped,
}

impl NotificationOutcome {
    /// Label value for the `status` dimension.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        }
    }
}

/// Record a persisted open-event
pub fn record_open_event() {
    counter!(names::OPEN_EVENTS_TOTAL).increment(1);
}

/// Record a persisted contact submission
pub fn record_submission() {
    counter!(names::SUBMISSIONS_TOTAL).increment(1);
}

/// Record the outcome of a notification attempt
pub fn record_notification(outcome: NotificationOutcome) {
    counter!(names::NOTIFICATIONS_TOTAL, "status" => outcome.as_str()).increment(1);
}

/// Record store operation metrics
pub fn record_store_operation(
    operation: &'static str,
    backend: &'static str,
    duration: Duration,
    success: bool,
) {
    let status = if success { "success" } else { "error" };
    counter!(
        names::STORE_OPERATIONS_TOTAL,
        "operation" => operation,
        "backend" => backend,
        "status" => status
    )
    .increment(1);
    histogram!(
        names::STORE_OPERATION_DURATION,
        "operation" => operation,
        "backend" => backend
    )
    .record(duration.as_secs_f64());
}
