//! Backoff calculation for best-effort store mirror writes.
//!
//! Portable, sync-only building blocks; the async retry loop that uses them
//! lives in the server crate (which has access to tokio).

use serde::{Deserialize, Serialize};

/// Default maximum retries for a mirror write.
pub const DEFAULT_MAX_RETRIES: u32 = 4;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Configuration for retrying failed persistence writes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between retries in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

/// Calculate exponential backoff delay with explicit randomness.
///
/// Formula: `min(max_delay, base_delay * 2^attempt) * (1 + (random*2-1) * jitter)`.
/// `random` should be a value in `[0.0, 1.0)` from a PRNG; a factor of 0.2
/// means the delay varies by ±20% around the exponential value.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_ms(config: &RetryConfig, attempt: u32, random: f64) -> u64 {
    let exponential = config
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(config.max_delay_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * config.jitter_factor;
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.base_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 5_000);
        assert!((config.jitter_factor - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn exponential_growth() {
        let config = no_jitter();
        assert_eq!(backoff_delay_ms(&config, 0, 0.5), 250);
        assert_eq!(backoff_delay_ms(&config, 1, 0.5), 500);
        assert_eq!(backoff_delay_ms(&config, 2, 0.5), 1_000);
        assert_eq!(backoff_delay_ms(&config, 3, 0.5), 2_000);
    }

    #[test]
    fn caps_at_max() {
        let config = no_jitter();
        assert_eq!(backoff_delay_ms(&config, 10, 0.5), 5_000);
    }

    #[test]
    fn jitter_bounds() {
        let config = RetryConfig::default();
        // random = 0.0 → -20%, random = 1.0 → +20%
        assert_eq!(backoff_delay_ms(&config, 0, 0.0), 200);
        assert_eq!(backoff_delay_ms(&config, 0, 1.0), 300);
        assert_eq!(backoff_delay_ms(&config, 0, 0.5), 250);
    }

    #[test]
    fn high_attempt_no_overflow() {
        let config = RetryConfig::default();
        let delay = backoff_delay_ms(&config, 100, 0.9);
        assert!(delay > 0);
        assert!(delay <= 6_000);
    }

    #[test]
    fn serde_fills_defaults() {
        let config: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }
}
