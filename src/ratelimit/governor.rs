//! Per-request admission decisions.

use axum::http::{header::USER_AGENT, HeaderMap};
use chrono::Utc;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::audit::{AuditEvent, AuditSink};
use super::category::{classify, Category};
use super::client::extract_client_key;
use super::clock::Clock;
use super::counter::LimitRule;
use super::settings::SettingsProvider;
use super::store::CounterStore;

/// Identifies one counter: a client within a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub category: Category,
    pub client: String,
}

impl CounterKey {
    pub fn new(category: Category, client: impl Into<String>) -> Self {
        Self {
            category,
            client: client.into(),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.client)
    }
}

/// Limits for every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryLimits {
    pub general: LimitRule,
    pub login: LimitRule,
    pub register: LimitRule,
}

impl CategoryLimits {
    /// The longest window of any category.
    pub fn longest_window(&self) -> Duration {
        self.general.window.max(self.login.window).max(self.register.window)
    }

    pub fn rule(&self, category: Category) -> &LimitRule {
        match category {
            Category::General => &self.general,
            Category::Login => &self.login,
            Category::Register => &self.register,
        }
    }
}

impl Default for CategoryLimits {
    fn default() -> Self {
        Self {
            general: LimitRule::per_minute(1000),
            login: LimitRule::per_minute(20),
            register: LimitRule::per_minute(20),
        }
    }
}

/// The parts of an inbound request the governor looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    /// Transport-level peer address, if known
    pub remote_addr: Option<SocketAddr>,
}

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The limit that was exceeded
    pub category: Category,
    pub client_key: String,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        self.category.rejection_message()
    }
}

/// Outcome of [`Governor::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Request-rate governor.
///
/// Shared by every request-handling task. Holds the counter store for the
/// life of the process and consults the settings provider on every call.
pub struct Governor {
    store: CounterStore<CounterKey>,
    limits: CategoryLimits,
    settings: Arc<dyn SettingsProvider>,
    audit: Arc<dyn AuditSink>,
}

impl Governor {
    /// Create a governor backed by the system clock.
    pub fn new(
        limits: CategoryLimits,
        settings: Arc<dyn SettingsProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store: CounterStore::new(),
            limits,
            settings,
            audit,
        }
    }

    /// Create a governor whose counters read time from `clock`.
    pub fn with_clock(
        limits: CategoryLimits,
        settings: Arc<dyn SettingsProvider>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: CounterStore::with_clock(clock),
            limits,
            settings,
            audit,
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// The category-specific limit (if enabled) is checked before the
    /// general one, and the first failing check short-circuits: later
    /// counters are not incremented. Every rejection is reported to the
    /// audit sink once.
    pub fn admit(&self, request: &RequestMeta<'_>) -> Decision {
        let client_key = extract_client_key(request.headers, request.remote_addr);
        let classification = classify(request.path);

        trace!(
            client_key = %client_key,
            path = %request.path,
            specific = ?classification.specific,
            "Admitting request"
        );

        for category in classification.categories() {
            if !self.settings.category_enabled(category) {
                continue;
            }

            let key = CounterKey::new(category, client_key.as_str());
            if !self.store.check_and_increment(&key, self.limits.rule(category)) {
                debug!(key = %key, "Rate limit exceeded");
                self.report(request, &client_key, category);
                return Decision::Reject(Rejection {
                    category,
                    client_key,
                });
            }
        }

        Decision::Allow
    }

    fn report(&self, request: &RequestMeta<'_>, client_key: &str, category: Category) {
        let user_agent = request
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        self.audit.log_rate_limit_violation(&AuditEvent {
            client_key: client_key.to_string(),
            path: request.path.to_string(),
            user_agent,
            category,
            timestamp: Utc::now(),
        });
    }

    /// Requests counted for `client` in `category` during the current window.
    pub fn current_count(&self, category: Category, client: &str) -> Option<u64> {
        self.store.current_count(&CounterKey::new(category, client))
    }

    /// Number of (client, category) counters held.
    pub fn tracked_counters(&self) -> usize {
        self.store.len()
    }

    /// Drop counters idle for longer than `idle_for`.
    ///
    /// `idle_for` is raised to the longest configured window so a counter
    /// still inside its window is never dropped.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        self.store.evict_idle(idle_for.max(self.limits.longest_window()))
    }

    pub fn limits(&self) -> &CategoryLimits {
        &self.limits
    }
}
