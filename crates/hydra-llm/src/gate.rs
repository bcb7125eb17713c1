//! Single-flight gate with minimum inter-call spacing.
//!
//! Some providers tolerate exactly one in-flight call and want breathing
//! room between consecutive calls. The gate is a capacity-1 queue (a fair
//! tokio mutex, so waiters run FIFO) plus the completion timestamp of the
//! previous call; the next caller sleeps until the configured gap has
//! elapsed since that completion before its upstream call starts.
//!
//! One gate per provider family, process-wide.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A capacity-1 serialization point with spacing.
#[derive(Debug)]
pub struct Gate {
    last_completion: Mutex<Option<Instant>>,
    gap: Duration,
}

impl Gate {
    #[must_use]
    pub fn new(gap: Duration) -> Self {
        Self {
            last_completion: Mutex::new(None),
            gap,
        }
    }

    /// Run `call` alone: one caller at a time, in arrival order, starting
    /// no earlier than `gap` after the previous call completed.
    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last = self.last_completion.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.gap;
            let now = Instant::now();
            if now < ready_at {
                debug!(wait_ms = (ready_at - now).as_millis() as u64, "gate throttled");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let output = call.await;
        *last = Some(Instant::now());
        output
    }
}
