//! Request categories and path classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path segment identifying the authentication endpoint.
pub const LOGIN_SEGMENT: &str = "/login";
/// Path segment identifying the registration endpoint.
pub const REGISTER_SEGMENT: &str = "/register";

/// A class of endpoint with its own independent limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Every request
    General,
    /// Authentication endpoint
    Login,
    /// Registration endpoint
    Register,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Login => "login",
            Category::Register => "register",
        }
    }

    /// Human-readable message returned to a rejected client.
    pub fn rejection_message(&self) -> &'static str {
        match self {
            Category::General => "Too many requests. Please try again later.",
            Category::Login => "Too many login attempts. Please try again later.",
            Category::Register => "Too many register attempts. Please try again later.",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The limits that apply to one request.
///
/// `General` always applies; `specific` is at most one of `Login` or
/// `Register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub specific: Option<Category>,
}

impl Classification {
    /// Categories to check, category-specific first.
    pub fn categories(&self) -> impl Iterator<Item = Category> {
        self.specific.into_iter().chain(std::iter::once(Category::General))
    }
}

/// Classify a request path by substring match.
///
/// A path containing both segments is treated as a login request.
pub fn classify(path: &str) -> Classification {
    let specific = if path.contains(LOGIN_SEGMENT) {
        Some(Category::Login)
    } else if path.contains(REGISTER_SEGMENT) {
        Some(Category::Register)
    } else {
        None
    };

    Classification { specific }
}
