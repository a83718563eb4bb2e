//! Bounded polling for asynchronous readiness conditions
//!
//! Every wait in a run goes through [`poll_until`]: sleep one interval, make
//! an attempt, repeat until the attempt yields a value or the deadline
//! passes. Attempts decide for themselves which errors are transient. They
//! log and return `Ok(None)` to keep polling, and only return `Err` for
//! failures that must abort the wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::Error;

/// Interval and deadline for one poll loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep before each attempt
    pub interval: Duration,
    /// Wall-clock budget for the whole loop
    pub timeout: Duration,
}

impl PollPolicy {
    /// Create a policy with the given interval and deadline
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Why a poll loop ended without a value
#[derive(Debug)]
pub enum PollError {
    /// The deadline passed before any attempt succeeded
    Timeout {
        /// The deadline that was exhausted
        timeout: Duration,
        /// How many attempts were made
        attempts: u32,
    },
    /// An attempt returned a fatal error
    Aborted(Error),
}

impl PollError {
    /// Convert into the crate error, building the timeout variant with `on_timeout`
    pub fn or_timeout(self, on_timeout: impl FnOnce(Duration) -> Error) -> Error {
        match self {
            PollError::Timeout { timeout, .. } => on_timeout(timeout),
            PollError::Aborted(e) => e,
        }
    }
}

/// Poll `attempt` until it yields a value or `policy.timeout` elapses.
///
/// The loop always starts at least one attempt and returns within
/// `timeout + interval`. An attempt still running at that point is dropped
/// and the loop reports a timeout.
///
/// # Arguments
/// * `policy` - Interval and deadline
/// * `description` - What is being waited for, used in log messages
/// * `attempt` - Returns `Ok(Some(value))` when done, `Ok(None)` to keep
///   polling, or `Err` to stop immediately
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    description: &str,
    mut attempt: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    let start = Instant::now();
    let hard_deadline = start + policy.timeout + policy.interval;
    let mut attempts = 0u32;

    loop {
        tokio::time::sleep(policy.interval).await;
        attempts += 1;

        let Ok(outcome) = tokio::time::timeout_at(hard_deadline, attempt()).await else {
            debug!(condition = %description, attempts, "attempt outlived the deadline");
            return Err(PollError::Timeout {
                timeout: policy.timeout,
                attempts,
            });
        };

        match outcome {
            Ok(Some(value)) => {
                debug!(
                    condition = %description,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis(),
                    "condition met"
                );
                return Ok(value);
            }
            Ok(None) => {
                trace!(condition = %description, attempts, "condition not yet met");
            }
            Err(e) => return Err(PollError::Aborted(e)),
        }

        if start.elapsed() >= policy.timeout {
            return Err(PollError::Timeout {
                timeout: policy.timeout,
                attempts,
            });
        }
    }
}
