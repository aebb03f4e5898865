//! Bounded retry and polling primitives.
//!
//! Every retrying operation in the control plane (swarm init, overlay
//! create, stack deploy, readiness waits) goes through these helpers
//! instead of open-coding sleep loops. Backoff is built on
//! [backon](https://docs.rs/backon); the linear ladder the overlay create
//! uses is not shipped by backon, so [`LinearBuilder`] implements its
//! `BackoffBuilder` trait.

use backon::BackoffBuilder;
use std::time::{Duration, Instant};

/// Builder for a linearly increasing backoff: `step`, `2*step`, `3*step`...
/// capped at `max_times` delays.
#[derive(Debug, Clone, Copy)]
pub struct LinearBuilder {
    step: Duration,
    max_times: usize,
}

impl LinearBuilder {
    pub const fn new(step: Duration, max_times: usize) -> Self {
        Self { step, max_times }
    }
}

/// Iterator state for [`LinearBuilder`].
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    attempt: usize,
    max_times: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_times {
            return None;
        }
        self.attempt += 1;
        Some(self.step.saturating_mul(u32::try_from(self.attempt).unwrap_or(u32::MAX)))
    }
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            step: self.step,
            attempt: 0,
            max_times: self.max_times,
        }
    }
}

/// Fixed-delay backoff for `attempts` total attempts.
pub fn fixed(attempts: usize, delay: Duration) -> backon::ConstantBuilder {
    backon::ConstantBuilder::default()
        .with_delay(delay)
        .with_max_times(attempts.saturating_sub(1))
}

/// Linear backoff ladder for `attempts` total attempts.
pub fn linear(step: Duration, attempts: usize) -> LinearBuilder {
    LinearBuilder::new(step, attempts.saturating_sub(1))
}

/// Poll `pred` every `interval` until it holds or `timeout` elapses.
///
/// `tick` runs before every probe; the orchestrator passes its heartbeat
/// refresh so the dead-man's switch never mistakes a legitimate wait for a
/// hang. Returns whether the predicate was satisfied.
pub fn poll_until(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut tick: impl FnMut(),
    mut pred: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        tick();
        if pred() {
            return true;
        }
        if Instant::now() + interval > deadline {
            tracing::warn!(what = what, timeout_secs = timeout.as_secs(), "Wait timed out");
            return false;
        }
        std::thread::sleep(interval);
    }
}
