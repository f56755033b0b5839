//! Bounded polling.
//!
//! [`poll_until`] runs a check until it yields a value or the wall-clock
//! deadline passes. Failures the caller classifies as transient are retried;
//! on timeout the most recent one is returned as-is so the scenario reports
//! the real cause rather than a generic timeout.

use std::time::Duration;
use std::time::Instant;

use tracing::trace;

use crate::error::HarnessError;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    timeout: Duration,
    interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// The default timeout stretched by `ratio`, for slow steps.
    pub fn scaled(ratio: f64) -> Self {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
        Self {
            timeout: DEFAULT_POLL_TIMEOUT.mul_f64(ratio),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Deadline reached without any transient failure to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub elapsed: Duration,
}

impl From<TimedOut> for HarnessError {
    fn from(timed_out: TimedOut) -> Self {
        HarnessError::Timeout {
            elapsed: timed_out.elapsed,
        }
    }
}

/// Polls `check` until it returns `Ok(Some(_))`.
///
/// `Ok(None)` means "not yet". An error for which `is_transient` holds is
/// remembered and retried; any other error is returned immediately. The
/// deadline is checked between attempts, so a single slow attempt can
/// overrun it.
pub fn poll_until<T, E, F, C>(policy: &PollPolicy, is_transient: C, mut check: F) -> Result<T, E>
where
    E: From<TimedOut>,
    F: FnMut() -> Result<Option<T>, E>,
    C: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut last_error: Option<E> = None;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match check() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) if is_transient(&err) => last_error = Some(err),
            Err(err) => return Err(err),
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            trace!(attempts, elapsed_ms = elapsed.as_millis(), "Poll deadline reached");
            return Err(last_error.unwrap_or_else(|| TimedOut { elapsed }.into()));
        }
        std::thread::sleep(policy.interval.min(policy.timeout - elapsed));
    }
}

/// Scenario-step polling: expectation failures, RPC errors and transient
/// transport errors all count as "not yet".
pub fn wait_for<T, F>(policy: &PollPolicy, check: F) -> Result<T, HarnessError>
where
    F: FnMut() -> Result<Option<T>, HarnessError>,
{
    poll_until(policy, HarnessError::is_retryable, check)
}

/// Like [`wait_for`] for a boolean condition.
pub fn wait_until<F>(policy: &PollPolicy, mut condition: F) -> Result<(), HarnessError>
where
    F: FnMut() -> Result<bool, HarnessError>,
{
    wait_for(policy, || Ok(condition()?.then_some(())))
}
