//! Process-wide client configuration, built once and handed to the requestor.

use std::time::Duration;

use crate::http::{BackoffFn, RetryPolicy};

pub const DEFAULT_BASE_URI: &str = "https://api.smartsheet.com/2.0/";
pub const GOV_BASE_URI: &str = "https://api.smartsheetgov.com/2.0/";
pub const EU_BASE_URI: &str = "https://api.smartsheet.eu/2.0/";

/// Environment variable overriding the API host.
pub const API_HOST_ENV: &str = "SMARTSHEET_API_HOST";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Used when a request carries no `base_url` of its own.
    pub base_url: String,
    /// Defaults for requests that do not override retry settings.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URI.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Reads the API host from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    /// Empty values count as unset.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(API_HOST_ENV)
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URI.to_string());
        Self {
            base_url,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retry_duration_millis(mut self, millis: u64) -> Self {
        self.retry.max_retry_duration = Duration::from_millis(millis);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.retry.backoff = backoff;
        self
    }
}
