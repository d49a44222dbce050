//! Progress reporting for step execution
//!
//! Actions and the engine push [`Progress`] updates through a
//! [`ProgressReporter`]; callers decide where they go (events, logs,
//! nowhere).

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where a running step has got to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub step: String,

    /// 0..=100, clamped on construction
    pub percentage: u8,

    pub message: String,
}

impl Progress {
    pub fn new(step: impl Into<String>, percentage: u8, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            percentage: percentage.min(100),
            message: message.into(),
        }
    }

    pub fn starting(step: impl Into<String>) -> Self {
        Self::new(step, 0, "Starting...")
    }

    pub fn completed(step: impl Into<String>) -> Self {
        Self::new(step, 100, "Completed")
    }

    /// Failure is reported at 0% so it never reads as complete
    pub fn failed(step: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::new(step, 0, format!("Failed: {}", reason))
    }

    pub fn is_complete(&self) -> bool {
        self.percentage >= 100
    }
}

/// Sink for step progress
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Discards everything
#[derive(Debug, Default, Clone)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _progress: Progress) {}
}

/// Forwards progress to `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, progress: Progress) {
        if progress.is_complete() || progress.percentage == 0 {
            info!(step = %progress.step, percentage = progress.percentage, "{}", progress.message);
        } else {
            debug!(step = %progress.step, percentage = progress.percentage, "{}", progress.message);
        }
    }
}

/// Keeps every update in memory, mainly for tests
#[derive(Debug, Default)]
pub struct CollectingReporter {
    updates: std::sync::Mutex<Vec<Progress>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<Progress> {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Progress> {
        self.updates().last().cloned()
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, progress: Progress) {
        self.updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(progress);
    }
}
