//! HTTP boundary: governor middleware, admin API, and server.

mod admin;
mod middleware;
mod server;

pub use admin::{admin_router, AdminState, GovernorStats, SettingsUpdate};
pub use middleware::governor_middleware;
pub use server::{public_router, HttpServer};
