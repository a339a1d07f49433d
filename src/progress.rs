//! Progress reporting and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Advisory progress of a long-running pass (frames processed out of total).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Frames handled so far
    pub processed: u64,
    /// Total frames expected, 0 when unknown
    pub total: u64,
}

impl Progress {
    pub fn new(processed: u64, total: u64) -> Self {
        Self { processed, total }
    }

    /// Completion percentage in `[0, 100]`, or 0 when the total is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        ((self.processed as f64 / self.total as f64) * 100.0).min(100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token handed to another thread can stop
/// an in-flight detection or reframing pass.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every pass observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for a new pass.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
