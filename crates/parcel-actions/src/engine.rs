//! Registry of actions keyed by type tag, and the step loop that drives them

use crate::context::{ActionContext, ActionResult};
use crate::error::{ActionError, Result};
use crate::outcome::{ExecutionResult, StepOutcome};
use crate::progress::Progress;
use crate::runner::{RunContext, StepRunner};
use crate::traits::Action;
use async_trait::async_trait;
use parcel_document::ActionStep;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Runs steps through whichever registered action matches their type tag
///
/// # Example
///
/// ```ignore
/// use parcel_actions::{ActionEngine, NoopAction};
///
/// let mut engine = ActionEngine::new();
/// engine.register(NoopAction::new("noop"));
///
/// let results = engine.execute_steps(&steps, &run_ctx).await;
/// ```
pub struct ActionEngine {
    actions: HashMap<String, Arc<dyn Action>>,
    /// Last link of the timeout chain: step, then action, then this
    default_timeout: Option<Duration>,
}

impl Default for ActionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionEngine {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            default_timeout: None,
        }
    }

    /// Timeout for steps whose step and action both declare none
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Later registrations under the same tag replace earlier ones
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        self.register_arc(Arc::new(action));
    }

    pub fn register_arc(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_owned(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(name)
    }

    pub fn has_action(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    /// Registered type tags in sorted order
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Look up the step's action and run it with [`execute_action`](Self::execute_action)
    pub async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let action_type = &ctx.step().action_type;
        let action = self
            .actions
            .get(action_type)
            .ok_or_else(|| ActionError::NotFound(action_type.clone()))?;

        self.execute_action(action.clone(), ctx).await
    }

    /// Validate, then run under the resolved timeout, reporting start and
    /// end through the context's progress sink
    pub async fn execute_action(
        &self,
        action: Arc<dyn Action>,
        ctx: &ActionContext,
    ) -> Result<ActionResult> {
        let step_name = ctx.step_name().to_string();

        action.validate(ctx)?;

        if ctx.is_dry_run() && !action.supports_dry_run() {
            return Ok(ActionResult::success(format!(
                "DRY RUN: {} does not support dry-run, skipped",
                action.name()
            )));
        }

        ctx.progress_reporter().report(Progress::starting(&step_name));

        let start = Instant::now();

        let action_timeout = ctx
            .timeout()
            .or_else(|| action.default_timeout())
            .or(self.default_timeout);

        let result = if let Some(timeout_duration) = action_timeout {
            match timeout(timeout_duration, action.execute(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(ActionError::Timeout(timeout_duration)),
            }
        } else {
            action.execute(ctx).await
        };

        let elapsed = start.elapsed();

        match &result {
            Ok(r) if r.is_success() => {
                ctx.progress_reporter().report(Progress::completed(&step_name));
            }
            Ok(r) => {
                ctx.progress_reporter()
                    .report(Progress::failed(&step_name, &r.message));
            }
            Err(e) => {
                ctx.progress_reporter().report(Progress::failed(&step_name, e));
            }
        }

        result.map(|r| r.with_duration(elapsed))
    }

    /// Validate every step of a document without executing anything
    pub fn validate_steps(&self, steps: &[ActionStep]) -> Result<()> {
        for step in steps {
            let action = self
                .actions
                .get(&step.action_type)
                .ok_or_else(|| ActionError::NotFound(step.action_type.clone()))?;

            action.validate(&ActionContext::new(step.clone()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StepRunner for ActionEngine {
    async fn execute_steps(&self, steps: &[ActionStep], run: &RunContext) -> ExecutionResult {
        let mut results = ExecutionResult::new();

        info!(
            document = %run.document_id,
            steps = steps.len(),
            policy = %run.failure_policy,
            "Executing document steps"
        );

        for step in steps {
            if results.contains(&step.name) {
                warn!(step = %step.name, "Duplicate step name, skipping");
                continue;
            }

            debug!(step = %step.name, action = %step.action_type, "Starting step");

            let ctx = ActionContext::new(step.clone())
                .with_progress_reporter(run.progress_reporter.clone())
                .with_dry_run(run.dry_run);

            let start = Instant::now();
            let result = self.execute(&ctx).await;
            let outcome = StepOutcome::from_action(result, start.elapsed());
            let failed = !outcome.is_success();

            if failed {
                error!(
                    step = %step.name,
                    status = ?outcome.status,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "Step failed"
                );
            } else {
                info!(step = %step.name, "Step completed successfully");
            }

            results.record(step.name.clone(), outcome);

            if failed && run.halts_after_failure(step) {
                warn!(
                    step = %step.name,
                    remaining = steps.len() - results.len(),
                    "Halting document after failed step"
                );
                break;
            }
        }

        results
    }
}

impl std::fmt::Debug for ActionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEngine")
            .field("actions", &self.action_names())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
