//! Configuration management for Bookgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GovernorError, Result};
use crate::ratelimit::{CategoryLimits, LimitRule, RateLimitSettings};

/// Prefix for environment overrides, e.g. `BOOKGATE__SERVER__LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "BOOKGATE";

/// Main configuration for the Bookgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public HTTP address, every request is governed
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Admin API address
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admin_addr: default_admin_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_admin_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9091))
}

/// A single limit as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRuleConfig {
    /// Requests admitted per window
    pub max_requests: u64,
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl LimitRuleConfig {
    fn to_rule(self) -> LimitRule {
        LimitRule::new(self.max_requests, Duration::from_millis(self.window_ms))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.max_requests == 0 {
            return Err(GovernorError::Config(format!(
                "rate_limiting.{name}.max_requests must be positive"
            )));
        }
        if self.window_ms == 0 {
            return Err(GovernorError::Config(format!(
                "rate_limiting.{name}.window_ms must be positive"
            )));
        }
        Ok(())
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_general() -> LimitRuleConfig {
    LimitRuleConfig {
        max_requests: 1000,
        window_ms: default_window_ms(),
    }
}

fn default_auth() -> LimitRuleConfig {
    LimitRuleConfig {
        max_requests: 20,
        window_ms: default_window_ms(),
    }
}

fn default_true() -> bool {
    true
}

/// Periodic sweep of idle counters. Absent means counters are never evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Counters whose window opened longer ago than this are dropped
    pub idle_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    #[serde(default = "default_general")]
    pub general: LimitRuleConfig,

    #[serde(default = "default_auth")]
    pub login: LimitRuleConfig,

    #[serde(default = "default_auth")]
    pub register: LimitRuleConfig,

    /// Initial state of the login toggle
    #[serde(default = "default_true")]
    pub login_limit_enabled: bool,

    /// Initial state of the register toggle
    #[serde(default = "default_true")]
    pub register_limit_enabled: bool,

    #[serde(default)]
    pub eviction: Option<EvictionConfig>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            general: default_general(),
            login: default_auth(),
            register: default_auth(),
            login_limit_enabled: true,
            register_limit_enabled: true,
            eviction: None,
        }
    }
}

impl RateLimitingConfig {
    /// Limits in the form the governor consumes.
    pub fn limits(&self) -> CategoryLimits {
        CategoryLimits {
            general: self.general.to_rule(),
            login: self.login.to_rule(),
            register: self.register.to_rule(),
        }
    }

    /// Toggle store seeded with the configured initial state.
    pub fn settings(&self) -> RateLimitSettings {
        RateLimitSettings::new(self.login_limit_enabled, self.register_limit_enabled)
    }

    pub fn validate(&self) -> Result<()> {
        self.general.validate("general")?;
        self.login.validate("login")?;
        self.register.validate("register")?;

        if let Some(eviction) = &self.eviction {
            if eviction.interval_secs == 0 || eviction.idle_secs == 0 {
                return Err(GovernorError::Config(
                    "rate_limiting.eviction intervals must be positive".to_string(),
                ));
            }

            let longest_window_ms = self
                .general
                .window_ms
                .max(self.login.window_ms)
                .max(self.register.window_ms);
            if eviction.idle_secs.saturating_mul(1000) < longest_window_ms {
                return Err(GovernorError::Config(format!(
                    "rate_limiting.eviction.idle_secs must cover the longest window ({longest_window_ms} ms)"
                )));
            }
        }
        Ok(())
    }
}

impl GovernorConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GovernorConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GovernorError::Config(format!("Failed to parse config: {}", e)))?;
        config.rate_limiting.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional YAML file, then apply
    /// `BOOKGATE__`-prefixed environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: GovernorConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.rate_limiting.validate()?;
        Ok(config)
    }
}
