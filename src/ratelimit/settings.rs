//! Runtime toggles for the category-specific limits.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::category::Category;

/// Source of the per-category enable flags.
///
/// Read on every request; implementations must not cache.
pub trait SettingsProvider: Send + Sync {
    fn login_limit_enabled(&self) -> bool;

    fn register_limit_enabled(&self) -> bool;

    /// Whether the limit for `category` is in force. The general limit
    /// cannot be switched off.
    fn category_enabled(&self, category: Category) -> bool {
        match category {
            Category::General => true,
            Category::Login => self.login_limit_enabled(),
            Category::Register => self.register_limit_enabled(),
        }
    }
}

/// Point-in-time view of the toggles, as exchanged with the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub login_limit_enabled: bool,
    pub register_limit_enabled: bool,
}

/// In-memory toggle store. Both limits start enabled.
#[derive(Debug)]
pub struct RateLimitSettings {
    login: AtomicBool,
    register: AtomicBool,
}

impl RateLimitSettings {
    pub fn new(login_enabled: bool, register_enabled: bool) -> Self {
        Self {
            login: AtomicBool::new(login_enabled),
            register: AtomicBool::new(register_enabled),
        }
    }

    pub fn set_login_limit_enabled(&self, enabled: bool) {
        self.login.store(enabled, Ordering::SeqCst);
    }

    pub fn set_register_limit_enabled(&self, enabled: bool) {
        self.register.store(enabled, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            login_limit_enabled: self.login_limit_enabled(),
            register_limit_enabled: self.register_limit_enabled(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl SettingsProvider for RateLimitSettings {
    fn login_limit_enabled(&self) -> bool {
        self.login.load(Ordering::SeqCst)
    }

    fn register_limit_enabled(&self) -> bool {
        self.register.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enabled() {
        let settings = RateLimitSettings::default();
        assert!(settings.login_limit_enabled());
        assert!(settings.register_limit_enabled());
    }

    #[test]
    fn test_toggles() {
        let settings = RateLimitSettings::default();

        settings.set_login_limit_enabled(false);
        assert!(!settings.category_enabled(Category::Login));
        assert!(settings.category_enabled(Category::Register));

        settings.set_register_limit_enabled(false);
        assert_eq!(
            settings.snapshot(),
            SettingsSnapshot {
                login_limit_enabled: false,
                register_limit_enabled: false,
            }
        );
    }

    #[test]
    fn test_general_always_enabled() {
        let settings = RateLimitSettings::new(false, false);
        assert!(settings.category_enabled(Category::General));
    }
}
