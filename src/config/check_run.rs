//! Check-run and transfer configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::workflow::DEFAULT_MAX_REPRINT_COUNT;

/// Production banking partner drop location.
pub const DEFAULT_PAYMENT_DESTINATION: &str = "/production/OutBox/VENUS/";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckRunConfig {
    /// Reprints allowed per run before it fails.
    pub max_reprint_count: u32,
    /// Only allow reprints on the run's own check-run date.
    pub same_day_reprint_only: bool,
    /// How long `await_confirmation` waits.
    pub confirmation_timeout_secs: u64,
    /// Poll interval while waiting for confirmation.
    pub confirmation_poll_interval_ms: u64,
    /// Destination recorded in transfer audits.
    pub payment_destination: String,
    /// Directory the filesystem transport writes payment files to.
    pub outbox_dir: String,
}

impl CheckRunConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms.max(1))
    }
}

impl Default for CheckRunConfig {
    fn default() -> Self {
        Self {
            max_reprint_count: DEFAULT_MAX_REPRINT_COUNT,
            same_day_reprint_only: false,
            confirmation_timeout_secs: 300,
            confirmation_poll_interval_ms: 500,
            payment_destination: DEFAULT_PAYMENT_DESTINATION.to_string(),
            outbox_dir: "./data/outbox".to_string(),
        }
    }
}

/// Exponential back-off for payment file transmission.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferRetryConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempts, first one included.
    pub max_attempts: usize,
    pub jitter: bool,
}

impl Default for TransferRetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 100,
            max_delay_ms: 5_000,
            max_attempts: 3,
            jitter: true,
        }
    }
}

impl TransferRetryConfig {
    /// No delays, for tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts,
            jitter: false,
        }
    }
}
