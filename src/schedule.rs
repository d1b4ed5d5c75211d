//! Cooperative timers driven by the engine tick.
//!
//! Delayed work (the legacy migration, the client catch-up retry) is a [`Timer`]
//! held by whichever component scheduled it. The owner checks [`Timer::is_due`]
//! on each tick; nothing sleeps or blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A one-shot deadline with its own cancellation flag.
#[derive(Debug, Clone)]
pub struct Timer {
    /// `None` when the delay runs past what `Instant` can represent.
    deadline: Option<Instant>,
    cancel: CancelFlag,
}

impl Timer {
    /// Timer that fires `delay` after `now`. A delay too large to represent
    /// never fires.
    pub fn after(now: Instant, delay: Duration) -> Self {
        let deadline = now.checked_add(delay);
        if deadline.is_none() {
            tracing::warn!("Timer delay {:?} is out of range, it will never fire", delay);
        }
        Self {
            deadline,
            cancel: CancelFlag::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline has passed, unless cancelled.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.cancel.is_cancelled() && self.deadline.is_some_and(|at| now >= at)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }
}
