//! The step action abstraction
//!
//! Every document step names an action type (`runShellScript`,
//! `writefile`, ...). The engine looks that tag up and hands the step to
//! the matching [`Action`].

use crate::context::{ActionContext, ActionResult};
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// One kind of step the engine knows how to run
///
/// ```ignore
/// use parcel_actions::{Action, ActionContext, ActionResult, Result};
/// use async_trait::async_trait;
///
/// struct Touch;
///
/// #[async_trait]
/// impl Action for Touch {
///     fn name(&self) -> &str { "touch" }
///     fn description(&self) -> &str { "Create an empty file" }
///     fn required_inputs(&self) -> Vec<&str> { vec!["path"] }
///
///     async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
///         let path = ctx.working_dir().join(ctx.input_str("path").unwrap_or_default());
///         tokio::fs::write(&path, b"").await?;
///         Ok(ActionResult::success(format!("touched {}", path.display())))
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync {
    /// Type tag steps use to select this action
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run one step. An `Err` is recorded as a failed step result.
    async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult>;

    /// Timeout used when the step itself declares none. `None` waits forever.
    fn default_timeout(&self) -> Option<Duration> {
        None
    }

    /// Checked before `execute`; the default only requires
    /// [`required_inputs`](Action::required_inputs) to be present.
    fn validate(&self, ctx: &ActionContext) -> Result<()> {
        match self
            .required_inputs()
            .into_iter()
            .find(|key| ctx.input(key).is_none())
        {
            Some(missing) => Err(ActionError::MissingInput(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Whether `execute` honours `ctx.is_dry_run()`. Actions returning
    /// false are skipped entirely during a dry run.
    fn supports_dry_run(&self) -> bool {
        false
    }

    fn required_inputs(&self) -> Vec<&str> {
        Vec::new()
    }

    fn optional_inputs(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Test double that succeeds without touching anything
pub struct NoopAction {
    tag: String,
}

impl NoopAction {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

#[async_trait]
impl Action for NoopAction {
    fn name(&self) -> &str {
        &self.tag
    }

    fn description(&self) -> &str {
        "Succeed without side effects"
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
        Ok(ActionResult::success(format!("{}: nothing to do", ctx.step_name())))
    }

    fn supports_dry_run(&self) -> bool {
        true
    }
}

/// Test double whose every run returns an execution error
pub struct FailingAction {
    tag: String,
    reason: String,
}

impl FailingAction {
    pub fn new(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.tag
    }

    fn description(&self) -> &str {
        "Fail every step"
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
        Err(ActionError::ExecutionFailed(format!(
            "{}: {}",
            ctx.step_name(),
            self.reason
        )))
    }
}

/// Test double that waits before succeeding, for timeout paths
pub struct SleepAction {
    tag: String,
    delay: Duration,
}

impl SleepAction {
    pub fn new(tag: impl Into<String>, delay: Duration) -> Self {
        Self {
            tag: tag.into(),
            delay,
        }
    }
}

#[async_trait]
impl Action for SleepAction {
    fn name(&self) -> &str {
        &self.tag
    }

    fn description(&self) -> &str {
        "Wait, then succeed"
    }

    async fn execute(&self, _ctx: &ActionContext) -> Result<ActionResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ActionResult::success(format!("waited {:?}", self.delay)))
    }
}
