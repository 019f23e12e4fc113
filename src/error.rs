//! Error types shared across the engine
//!
//! Storage failures live in [`crate::storage::error`]. Everything here is
//! recoverable per collection cycle except [`ConfigError`], which aborts startup.

use std::net::IpAddr;

use thiserror::Error;

use crate::Category;

/// Querying the operating system for a sample failed
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A metric could not be read from the OS
    #[error("{category} metrics unavailable: {reason}")]
    Unavailable { category: Category, reason: String },

    /// The ping process could not be started
    #[error("failed to ping {ip}: {source}")]
    Ping {
        ip: IpAddr,
        #[source]
        source: std::io::Error,
    },

    /// The adapter did not answer within its time budget
    #[error("{category} adapter timed out after {millis}ms")]
    Timeout { category: Category, millis: u128 },
}

/// Delivering an alert over a notification channel failed
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification endpoint answered with status {0}")]
    Rejected(reqwest::StatusCode),

    /// At least one channel of a fan-out failed
    #[error("{failed} of {total} notification channels failed")]
    Partial { failed: usize, total: usize },
}

/// The configuration is unusable; the process must not start
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
