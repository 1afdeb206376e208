use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::ElectionError;
use crate::Error;
use crate::Result;
use crate::SystemError;

/// Runs `task` until it succeeds, bounding every attempt with the policy's
/// timeout and doubling the delay between attempts up to `max_delay_ms`.
///
/// `max_retries == 0` means retry until success.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let mut retries = 0;
    loop {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r);
            }
            Ok(Err(error)) => {
                warn!("failed with error: {:?}", &error);
                if !error.is_transient() {
                    return Err(error);
                }
            }
            Err(_) => {
                warn!("task_with_timeout_and_exponential_backoff timeout after {:?}", timeout_duration);
            }
        };

        retries += 1;
        if policy.max_retries != 0 && retries >= policy.max_retries {
            warn!("Task failed after {} retries", retries);
            return Err(ElectionError::RetryBudgetExhausted { attempts: retries }.into());
        }
        sleep(backoff_delay(&policy, retries)).await;
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped by `max_delay_ms`.
pub(crate) fn backoff_delay(
    policy: &BackoffPolicy,
    attempt: usize,
) -> Duration {
    let exp = attempt.saturating_sub(1).min(32) as u32;
    let delay = policy.base_delay_ms.saturating_mul(1u64 << exp);
    Duration::from_millis(delay.min(policy.max_delay_ms))
}

/// Uniformly random duration in `[min, max]`, used to spread competing nodes.
pub(crate) fn jitter(
    min: Duration,
    max: Duration,
) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

/// Wraps a single call with a deadline, mapping expiry to a transient error.
pub(crate) async fn with_timeout<F, P>(
    budget: Duration,
    fut: F,
) -> Result<P>
where
    F: std::future::Future<Output = Result<P>>,
{
    match timeout(budget, fut).await {
        Ok(r) => r,
        Err(_) => Err(Error::System(SystemError::Timeout(budget))),
    }
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
