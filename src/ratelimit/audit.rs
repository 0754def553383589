//! Audit reporting for rejected requests.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::category::Category;

/// A rejected request, as reported to the audit sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub client_key: String,
    pub path: String,
    pub user_agent: Option<String>,
    /// The limit that was exceeded
    pub category: Category,
    pub timestamp: DateTime<Utc>,
}

/// Receiver of rate-limit violations.
///
/// Called exactly once per rejected request and never for admitted ones.
pub trait AuditSink: Send + Sync {
    fn log_rate_limit_violation(&self, event: &AuditEvent);
}

/// Writes violations to the `security` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_rate_limit_violation(&self, event: &AuditEvent) {
        warn!(
            target: "security",
            event = "RATE_LIMIT_VIOLATION",
            client_key = %event.client_key,
            path = %event.path,
            user_agent = event.user_agent.as_deref().unwrap_or("-"),
            category = %event.category,
            timestamp = %event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            "Rate limit violation"
        );
    }
}
