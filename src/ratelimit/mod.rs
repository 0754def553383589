//! Rate limiting logic and state management.

mod audit;
mod category;
mod client;
mod clock;
mod counter;
mod governor;
mod settings;
mod store;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use category::{classify, Category, Classification, LOGIN_SEGMENT, REGISTER_SEGMENT};
pub use client::{extract_client_key, UNKNOWN_CLIENT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{LimitRule, RequestCounter};
pub use governor::{CategoryLimits, CounterKey, Decision, Governor, Rejection, RequestMeta};
pub use settings::{RateLimitSettings, SettingsProvider, SettingsSnapshot};
pub use store::CounterStore;
