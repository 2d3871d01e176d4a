//! Sequential retry executor
//!
//! One attempt at a time, no racing. Errors never escape: every call ends in
//! a `RetryOutcome` that carries the final result and the attempt count.

use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::time::Instant;

use super::config::RetryConfig;

/// Errors the engine can classify
///
/// The kind name is matched against the configured retry signatures together
/// with the `Display` message.
pub trait RetryableError: fmt::Display {
    fn kind_name(&self) -> &str {
        "Error"
    }
}

impl RetryableError for anyhow::Error {}

/// Per-invocation attempt bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryAttemptState {
    pub attempt_number: u32,
    pub last_error: Option<String>,
}

/// Final state of one `execute` call
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    pub total_time_ms: u64,
}

impl<T, E> RetryOutcome<T, E> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Attempts beyond the first
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Run `operation` under `config`, retrying errors that match its filter
pub async fn execute<F, Fut, T, E>(operation: F, name: &str, config: &RetryConfig) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let filter = config.retryable.clone();
    execute_with(operation, name, config, move |e: &E| {
        filter.matches(e.kind_name(), &e.to_string())
    })
    .await
}

/// Run `operation` with a caller-supplied retry classifier
///
/// The classifier replaces the signature filter; the attempt budget and
/// backoff still come from `config`.
pub async fn execute_with<F, Fut, T, E, C>(
    mut operation: F,
    name: &str,
    config: &RetryConfig,
    mut is_retryable: C,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
    C: FnMut(&E) -> bool,
{
    let started = Instant::now();
    let budget = config.attempt_budget();
    let mut state = RetryAttemptState::default();

    loop {
        state.attempt_number += 1;

        match operation().await {
            Ok(value) => {
                if state.attempt_number > 1 {
                    info!(
                        "{name} succeeded on attempt {}/{budget} (previous error: {})",
                        state.attempt_number,
                        state.last_error.as_deref().unwrap_or("none")
                    );
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: state.attempt_number,
                    total_time_ms: started.elapsed().as_millis() as u64,
                };
            }
            Err(e) => {
                let retryable = is_retryable(&e);
                state.last_error = Some(e.to_string());

                if !retryable {
                    warn!(
                        "{name} failed with non-retryable {} on attempt {}: {e}",
                        e.kind_name(),
                        state.attempt_number
                    );
                    return RetryOutcome {
                        result: Err(e),
                        attempts: state.attempt_number,
                        total_time_ms: started.elapsed().as_millis() as u64,
                    };
                }

                if state.attempt_number >= budget {
                    warn!("{name} exhausted {budget} attempts: {e}");
                    return RetryOutcome {
                        result: Err(e),
                        attempts: state.attempt_number,
                        total_time_ms: started.elapsed().as_millis() as u64,
                    };
                }

                let delay = config.jittered_delay(state.attempt_number);
                warn!(
                    "{name} attempt {}/{budget} failed ({}), retrying in {}ms: {e}",
                    state.attempt_number,
                    e.kind_name(),
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                debug!("{name} starting attempt {}", state.attempt_number + 1);
            }
        }
    }
}
