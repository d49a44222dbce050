//! What an action sees while it runs one step, and what it hands back

use crate::progress::{NoopReporter, ProgressReporter};
use parcel_document::{ActionStep, StepExecution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One step plus the run-time knobs the engine applies to it
pub struct ActionContext {
    step: ActionStep,
    progress: Arc<dyn ProgressReporter>,
    /// Starts as the step's own timeout; the engine may override it
    timeout: Option<Duration>,
    dry_run: bool,
}

impl ActionContext {
    /// Create a new action context for a step
    pub fn new(step: ActionStep) -> Self {
        let timeout = step.timeout;
        Self {
            step,
            progress: Arc::new(NoopReporter),
            timeout,
            dry_run: false,
        }
    }

    /// Overwrite one input, turning non-object inputs into an object first
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if !self.step.inputs.is_object() {
            self.step.inputs = serde_json::Value::Object(serde_json::Map::new());
        }
        if let serde_json::Value::Object(map) = &mut self.step.inputs {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_progress_reporter(mut self, sink: Arc<dyn ProgressReporter>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get the step
    pub fn step(&self) -> &ActionStep {
        &self.step
    }

    /// Get the step name
    pub fn step_name(&self) -> &str {
        &self.step.name
    }

    /// Get an input value
    pub fn input(&self, key: &str) -> Option<&serde_json::Value> {
        self.step.input(key)
    }

    /// Get a string input
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.step.input_str(key)
    }

    /// Get a boolean input, accepting `true`/`"true"`
    pub fn input_bool(&self, key: &str) -> Option<bool> {
        match self.step.input(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    /// Paths and correlation ids shared by the whole document
    pub fn execution(&self) -> &StepExecution {
        &self.step.execution
    }

    pub fn working_dir(&self) -> &Path {
        &self.step.execution.working_dir
    }

    /// Per-step output directory; empty when the caller gave none
    pub fn orchestration_dir(&self) -> &Path {
        &self.step.execution.orchestration_dir
    }

    pub fn progress_reporter(&self) -> &Arc<dyn ProgressReporter> {
        &self.progress
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// What a step produced when its action ran to completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    pub success: bool,

    /// Short summary, or the captured output for shell steps
    pub message: String,

    /// Structured extras keyed by name; shape is up to the action
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub output: HashMap<String, serde_json::Value>,

    /// Filled in by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// The action asked for a reboot once the document finishes
    #[serde(default)]
    pub reboot_requested: bool,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            output: HashMap::new(),
            duration: None,
            exit_code: None,
            reboot_requested: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    /// Add output data
    pub fn with_output(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.output.insert(key.into(), json_value);
        }
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the exit code
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Request a reboot after the document completes
    pub fn with_reboot(mut self) -> Self {
        self.reboot_requested = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Decode one `output` entry; `None` if missing or of another shape
    pub fn get_output_as<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.output
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("step", &self.step.name)
            .field("action_type", &self.step.action_type)
            .field("working_dir", &self.step.execution.working_dir)
            .field("timeout", &self.timeout)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Build a bare step with empty inputs and a default execution context
#[cfg(any(test, feature = "test-util"))]
pub fn ad_hoc_step(name: impl Into<String>, action_type: impl Into<String>) -> ActionStep {
    ActionStep {
        name: name.into(),
        action_type: action_type.into(),
        inputs: serde_json::Value::Object(serde_json::Map::new()),
        timeout: None,
        declared_critical: None,
        execution: StepExecution::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CollectingReporter;
    use serde_json::json;
    use std::path::PathBuf;

    fn test_step() -> ActionStep {
        let mut step = ad_hoc_step("install", "runShellScript");
        step.inputs = json!({ "runCommand": "echo hi", "createDirs": "true" });
        step.timeout = Some(Duration::from_secs(60));
        step.execution.working_dir = PathBuf::from("/work/pkgA");
        step.execution.orchestration_dir = PathBuf::from("/orch/install");
        step.execution.document_id = "doc-1".to_string();
        step
    }

    #[test]
    fn test_context_new() {
        let ctx = ActionContext::new(test_step());

        assert_eq!(ctx.step_name(), "install");
        assert_eq!(ctx.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(ctx.working_dir(), Path::new("/work/pkgA"));
        assert_eq!(ctx.orchestration_dir(), Path::new("/orch/install"));
        assert_eq!(ctx.execution().document_id, "doc-1");
        assert!(!ctx.is_dry_run());
    }

    #[test]
    fn test_context_inputs() {
        let ctx = ActionContext::new(test_step()).with_input("extra", 5);

        assert_eq!(ctx.input_str("runCommand"), Some("echo hi"));
        assert_eq!(ctx.input_bool("createDirs"), Some(true));
        assert_eq!(ctx.input("extra"), Some(&json!(5)));
        assert_eq!(ctx.input("missing"), None);
    }

    #[test]
    fn test_context_with_input_on_non_object() {
        let mut step = ad_hoc_step("a", "noop");
        step.inputs = serde_json::Value::Null;

        let ctx = ActionContext::new(step).with_input("k", "v");
        assert_eq!(ctx.input_str("k"), Some("v"));
    }

    #[test]
    fn test_context_overrides() {
        let reporter = Arc::new(CollectingReporter::new());
        let ctx = ActionContext::new(test_step())
            .with_timeout(Duration::from_secs(5))
            .with_dry_run(true)
            .with_progress_reporter(reporter.clone());

        ctx.progress_reporter()
            .report(crate::progress::Progress::starting("install"));

        assert_eq!(ctx.timeout(), Some(Duration::from_secs(5)));
        assert!(ctx.is_dry_run());
        assert_eq!(reporter.updates().len(), 1);
    }

    #[test]
    fn test_result_builders() {
        let result = ActionResult::failure("Command failed")
            .with_exit_code(1)
            .with_output("stdout", "boom")
            .with_duration(Duration::from_secs(2));

        assert!(!result.is_success());
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.get_output_as::<String>("stdout"), Some("boom".to_string()));
        assert_eq!(result.duration, Some(Duration::from_secs(2)));
        assert!(!result.reboot_requested);
        assert!(ActionResult::success("ok").with_reboot().reboot_requested);
    }

    #[test]
    fn test_result_serialization() {
        let result = ActionResult::success("Done")
            .with_output("bytes_written", 42)
            .with_exit_code(0);

        let json = serde_json::to_string(&result).unwrap();
        let parsed: ActionResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result, parsed);
    }
}
