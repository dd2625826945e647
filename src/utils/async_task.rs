use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::backoff::Backoff;
use crate::metrics::ERROR_TYPE_NOT_RETRYABLE;
use crate::metrics::ERROR_TYPE_RETRYABLE;
use crate::metrics::RETRY_ERRORS;
use crate::metrics::RETRY_ERRORS_FINAL;
use crate::metrics::RETRY_ERRORS_LATENCY_MS;
use crate::metrics::RETRY_RETRIES;
use crate::metrics::RETRY_SUCCESS;
use crate::metrics::RETRY_SUCCESS_LATENCY_MS;
use crate::BackoffPolicy;
use crate::Result;
use crate::RetryError;

/// Retry `task` with exponential backoff until it succeeds, fails with a
/// non-retryable error, or the policy's retries are exhausted. The last
/// error is returned on exhaustion.
pub async fn task_with_backoff<F, Fut, T>(
    task: F,
    policy: BackoffPolicy,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    task_with_backoff_while(|_| true, task, policy).await
}

/// Like [`task_with_backoff`], but `continue_fn(attempt)` is asked before
/// the first attempt and before every retry.
pub async fn task_with_backoff_while<C, F, Fut, T>(
    mut continue_fn: C,
    mut task: F,
    policy: BackoffPolicy,
) -> Result<T>
where
    C: FnMut(usize) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    if !continue_fn(attempt) {
        return Err(RetryError::WhileConditionFalse.into());
    }

    let mut last_error = match timed_attempt(&mut task, policy.timeout()).await {
        Ok(r) => return Ok(r),
        Err(e) => e,
    };
    attempt += 1;

    let mut backoff = Backoff::new(policy);
    let mut retries = 0;
    while policy.forever || retries < policy.max_retries {
        if !last_error.is_retryable() {
            debug!("attempt {} failed with non-retryable error: {}", attempt, last_error);
            return Err(last_error);
        }

        let delay = backoff.next_delay();
        warn!("attempt {} failed: {}; retrying in {:?}", attempt, last_error, delay);
        sleep(delay).await;

        if !continue_fn(attempt) {
            return Err(RetryError::WhileConditionFalse.into());
        }

        retries += 1;
        RETRY_RETRIES.inc();
        match timed_attempt(&mut task, policy.timeout()).await {
            Ok(r) => return Ok(r),
            Err(e) => last_error = e,
        }
        attempt += 1;
    }

    if !last_error.is_retryable() {
        return Err(last_error);
    }
    RETRY_ERRORS_FINAL.inc();
    warn!("task failed after {} attempts: {}", attempt, last_error);
    Err(last_error)
}

/// Runs one attempt and records its outcome and latency.
async fn timed_attempt<F, Fut, T>(
    task: &mut F,
    limit: Option<Duration>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let result = run_attempt(task, limit).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(_) => {
            RETRY_SUCCESS_LATENCY_MS.observe(elapsed_ms);
            RETRY_SUCCESS.inc();
        }
        Err(e) => {
            RETRY_ERRORS_LATENCY_MS.observe(elapsed_ms);
            let error_type = if e.is_retryable() {
                ERROR_TYPE_RETRYABLE
            } else {
                ERROR_TYPE_NOT_RETRYABLE
            };
            RETRY_ERRORS.with_label_values(&[error_type]).inc();
        }
    }
    result
}

async fn run_attempt<F, Fut, T>(
    task: &mut F,
    limit: Option<Duration>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => match timeout(limit, task()).await {
            Ok(r) => r,
            Err(_) => Err(RetryError::Timeout(limit).into()),
        },
        None => task().await,
    }
}

/// Spawn a named background task, logging if it stops with an error.
pub(crate) fn spawn_task<Fut>(
    name: &str,
    task: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
