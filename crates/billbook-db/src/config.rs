//! Ledger configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use billbook_core::{DEFAULT_MAX_COMMIT_ATTEMPTS, DEFAULT_ORGANISATION_ID};
use std::env;
use std::time::Duration;

/// Settings for a [`SaleCoordinator`](crate::coordinator::SaleCoordinator).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Organisation every operation is scoped to.
    pub organisation_id: String,

    /// Attempts per commit/void before a conflict is surfaced (default: 3)
    pub max_commit_attempts: u32,

    /// Backoff after the n-th conflict is `n × retry_backoff` (default: 25ms)
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            organisation_id: DEFAULT_ORGANISATION_ID.to_string(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `BILLBOOK_ORGANISATION_ID`
    /// - `BILLBOOK_MAX_COMMIT_ATTEMPTS`
    /// - `BILLBOOK_RETRY_BACKOFF_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = LedgerConfig::default();

        let organisation_id = match lookup("BILLBOOK_ORGANISATION_ID") {
            Some(id) if id.trim().is_empty() => {
                return Err(ConfigError::InvalidValue("BILLBOOK_ORGANISATION_ID".to_string()))
            }
            Some(id) => id.trim().to_string(),
            None => defaults.organisation_id,
        };

        let max_commit_attempts: u32 = match lookup("BILLBOOK_MAX_COMMIT_ATTEMPTS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BILLBOOK_MAX_COMMIT_ATTEMPTS".to_string()))?,
            None => defaults.max_commit_attempts,
        };
        if max_commit_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "BILLBOOK_MAX_COMMIT_ATTEMPTS".to_string(),
            ));
        }

        let retry_backoff = match lookup("BILLBOOK_RETRY_BACKOFF_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("BILLBOOK_RETRY_BACKOFF_MS".to_string()))?,
            ),
            None => defaults.retry_backoff,
        };

        Ok(LedgerConfig {
            organisation_id,
            max_commit_attempts,
            retry_backoff,
        })
    }

    pub fn organisation_id(mut self, organisation_id: impl Into<String>) -> Self {
        self.organisation_id = organisation_id.into();
        self
    }

    pub fn max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Backoff before the attempt following `failed_attempt`.
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        self.retry_backoff * failed_attempt
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
