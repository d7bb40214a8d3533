//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with optional jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::TransferRetryConfig;

/// Backoff for payment file transmission.
///
/// `max_attempts` counts the first attempt, so the builder gets one fewer
/// retry.
pub fn transfer_backoff(config: &TransferRetryConfig) -> ExponentialBuilder {
    let builder = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(config.min_delay_ms))
        .with_max_delay(Duration::from_millis(config.max_delay_ms))
        .with_max_times(config.max_attempts.saturating_sub(1));
    if config.jitter {
        builder.with_jitter()
    } else {
        builder
    }
}
