//! Per-step outcomes and the execution result map

use crate::context::ActionResult;
use crate::error::ActionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Final status of an attempted step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Success,
    Failed,
    TimedOut,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success)
    }
}

/// Outcome of one attempted step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub status: StepStatus,

    /// Message from the action, or the failure description
    pub message: String,

    /// Action-specific output
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub output: HashMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Failure detail; `None` on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,

    #[serde(default)]
    pub reboot_requested: bool,
}

impl StepOutcome {
    /// Build an outcome from an action's return value
    pub fn from_action(result: Result<ActionResult, ActionError>, elapsed: Duration) -> Self {
        match result {
            Ok(result) if result.success => Self {
                status: StepStatus::Success,
                message: result.message,
                output: result.output,
                exit_code: result.exit_code,
                error: None,
                duration: Some(result.duration.unwrap_or(elapsed)),
                reboot_requested: result.reboot_requested,
            },
            Ok(result) => Self {
                status: StepStatus::Failed,
                error: Some(result.message.clone()),
                message: result.message,
                output: result.output,
                exit_code: result.exit_code,
                duration: Some(result.duration.unwrap_or(elapsed)),
                reboot_requested: false,
            },
            Err(err) => {
                let status = match err {
                    ActionError::Timeout(_) => StepStatus::TimedOut,
                    _ => StepStatus::Failed,
                };
                Self::failed(status, err.to_string(), elapsed)
            }
        }
    }

    fn failed(status: StepStatus, detail: String, elapsed: Duration) -> Self {
        Self {
            status,
            message: detail.clone(),
            output: HashMap::new(),
            exit_code: None,
            error: Some(detail),
            duration: Some(elapsed),
            reboot_requested: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcomes keyed by step name, in execution order
///
/// Only attempted steps appear. A step that never ran has no entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ExecutionResult {
    outcomes: IndexMap<String, StepOutcome>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome; returns false (and keeps the first) on a repeated name
    pub fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) -> bool {
        match self.outcomes.entry(step.into()) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
        }
    }

    pub fn get(&self, step: &str) -> Option<&StepOutcome> {
        self.outcomes.get(step)
    }

    pub fn contains(&self, step: &str) -> bool {
        self.outcomes.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterate outcomes in execution order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepOutcome)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.outcomes.keys().map(|k| k.as_str()).collect()
    }

    /// Names of steps that did not succeed
    pub fn failed_steps(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.values().all(StepOutcome::is_success)
    }

    /// True if any attempted step asked for a reboot
    pub fn reboot_requested(&self) -> bool {
        self.outcomes.values().any(|o| o.reboot_requested)
    }
}

impl<'a> IntoIterator for &'a ExecutionResult {
    type Item = (&'a String, &'a StepOutcome);
    type IntoIter = indexmap::map::Iter<'a, String, StepOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}
