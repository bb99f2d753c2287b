use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for talking to the accrual system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base address, with or without scheme (`localhost:8081`, `http://accrual:8080/`)
    pub base_url: String,

    /// Timeout for one status request, in seconds
    pub request_timeout_secs: u64,

    /// Poller configuration
    pub poller: PollerConfig,
}

/// Reconciliation poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between two ticks
    pub poll_interval_secs: u64,

    /// Run the first tick immediately instead of after one interval
    pub run_on_start: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "localhost:8081".to_string(),
            request_timeout_secs: 10,
            poller: PollerConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 60, run_on_start: true }
    }
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL with a scheme and without a trailing slash
    pub fn normalized_base_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("http://{}", base)
        }
    }
}

impl PollerConfig {
    /// Time between ticks, never shorter than one second
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
