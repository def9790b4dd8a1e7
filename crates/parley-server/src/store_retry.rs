//! Async retry loop for best-effort persistence writes.
//!
//! Broadcasts are never rolled back when their mirror write fails; the
//! write is retried in the background with exponential backoff until it
//! succeeds, turns permanent, or runs out of attempts.

use std::future::Future;

use parley_core::retry::{backoff_delay_ms, RetryConfig};
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Spawn a background task that retries `op` per `config`.
///
/// `op` is invoked once immediately and then again after each backoff
/// delay while it keeps failing with a transient error. Permanent errors
/// (missing key, malformed document) stop the loop at once.
pub fn spawn_store_retry<F, Fut>(label: &'static str, config: RetryConfig, op: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = parley_store::Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(()) => {
                    if attempt > 0 {
                        warn!(label, attempt, "store write recovered after retry");
                    }
                    return;
                }
                Err(e) if !e.is_transient() => {
                    error!(label, error = %e, "store write failed permanently");
                    return;
                }
                Err(e) if attempt >= config.max_retries => {
                    error!(label, error = %e, attempts = attempt + 1, "store write abandoned");
                    metrics::counter!("store_retries_exhausted_total", "op" => label).increment(1);
                    return;
                }
                Err(e) => {
                    let delay = backoff_delay_ms(&config, attempt, rand::random::<f64>());
                    warn!(label, error = %e, attempt, delay_ms = delay, "store write failed, retrying");
                    metrics::counter!("store_retries_total", "op" => label).increment(1);
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    })
}
