//! Deadline-bounded polling
//!
//! Every "wait until X" in the harness funnels through [`WaitEngine`]: a
//! check is evaluated, and if it does not yet yield a value the engine
//! sleeps a short fixed interval and tries again until the deadline passes.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{HarnessError, HarnessResult};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Absolute point in monotonic time shared across sequential waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left, saturating at zero
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_past(&self) -> bool {
        Instant::now() >= self.at
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaitEngine {
    poll_interval: Duration,
}

impl Default for WaitEngine {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Evaluate `check` until it yields a value or `timeout` elapses
    ///
    /// `check` runs at least once, even with a zero timeout.
    pub async fn wait_for<T, F>(&self, description: &str, timeout: Duration, mut check: F) -> HarnessResult<T>
    where
        F: FnMut() -> Option<T>,
    {
        self.wait_for_async(description, timeout, move || std::future::ready(check()))
            .await
    }

    /// Same contract as [`WaitEngine::wait_for`] for checks that need to await
    pub async fn wait_for_async<T, F, Fut>(&self, description: &str, timeout: Duration, mut check: F) -> HarnessResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let started = Instant::now();
        let deadline = Deadline::after(timeout);

        loop {
            if let Some(value) = check().await {
                tracing::debug!("✅ {} satisfied after {:?}", description, started.elapsed());
                return Ok(value);
            }

            let remaining = deadline.remaining();
            if remaining.is_zero() {
                tracing::warn!("⏰ Timeout waiting for: {}", description);
                return Err(HarnessError::WaitTimeout {
                    description: description.to_string(),
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    pub async fn wait_until<F>(&self, description: &str, timeout: Duration, mut predicate: F) -> HarnessResult<()>
    where
        F: FnMut() -> bool,
    {
        self.wait_for(description, timeout, || predicate().then_some(())).await
    }
}
