//! Single-slot deferred task.
//!
//! Holds at most one pending value. Scheduling replaces whatever is pending
//! and restarts the quiet period, so a value only comes out of
//! [`DeferredTask::expired`] once nothing newer has arrived for a full
//! period (trailing-edge debounce).

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};

pub struct DeferredTask<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

struct Pending<T> {
    value: T,
    deadline: Pin<Box<Sleep>>,
}

impl<T> DeferredTask<T> {
    pub fn new(delay: Duration) -> Self {
        DeferredTask {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending value and schedule `value` one full delay from now.
    pub fn schedule(&mut self, value: T) {
        self.cancel();
        self.pending = Some(Pending {
            value,
            deadline: Box::pin(sleep(self.delay)),
        });
    }

    /// Drop the pending value, if any, without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolves with the pending value once its deadline passes. Never
    /// resolves while nothing is scheduled.
    ///
    /// Cancel safe: dropping the future before it resolves leaves the
    /// pending value in place.
    pub async fn expired(&mut self) -> T {
        if let Some(pending) = self.pending.as_mut() {
            pending.deadline.as_mut().await;
        }
        match self.pending.take() {
            Some(Pending { value, .. }) => value,
            None => std::future::pending().await,
        }
    }
}
