//! Step runner interface
//!
//! A [`StepRunner`] takes an ordered step list and produces one outcome
//! per attempted step. [`crate::ActionEngine`] is the native
//! implementation; tests substitute fakes that record what they were
//! asked to run.

use crate::outcome::ExecutionResult;
use crate::policy::{CriticalStepPolicy, FailurePolicy, NoCriticalSteps};
use crate::progress::{NoopReporter, ProgressReporter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcel_document::ActionStep;
use std::sync::Arc;

/// Document-level settings for one run
#[derive(Clone)]
pub struct RunContext {
    /// Correlating document id
    pub document_id: String,

    /// When the document was created
    pub created_date: DateTime<Utc>,

    /// Halt behaviour after a failed step
    pub failure_policy: FailurePolicy,

    /// Which steps count as critical
    pub critical: Arc<dyn CriticalStepPolicy>,

    /// Receives per-step progress
    pub progress_reporter: Arc<dyn ProgressReporter>,

    /// Ask actions to skip side effects
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            created_date: Utc::now(),
            failure_policy: FailurePolicy::default(),
            critical: Arc::new(NoCriticalSteps),
            progress_reporter: Arc::new(NoopReporter),
            dry_run: false,
        }
    }

    pub fn with_created_date(mut self, created: DateTime<Utc>) -> Self {
        self.created_date = created;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_critical_policy(mut self, policy: Arc<dyn CriticalStepPolicy>) -> Self {
        self.critical = policy;
        self
    }

    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = reporter;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether a failure of `step` stops the run
    pub fn halts_after_failure(&self, step: &ActionStep) -> bool {
        self.failure_policy
            .halts_after_failure(self.critical.is_critical(step))
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("document_id", &self.document_id)
            .field("created_date", &self.created_date)
            .field("failure_policy", &self.failure_policy)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Runs an ordered list of steps
///
/// Implementations must run steps strictly in order, never in parallel,
/// and record exactly one outcome per attempted step.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn execute_steps(&self, steps: &[ActionStep], ctx: &RunContext) -> ExecutionResult;
}
