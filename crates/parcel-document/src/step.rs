//! Parsed action steps

use crate::context::StepExecution;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A validated step, ready to hand to a runner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    /// Step name, unique within its document
    pub name: String,

    /// Action type tag used for dispatch
    pub action_type: String,

    /// Opaque inputs for the action
    pub inputs: serde_json::Value,

    /// Step timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Criticality declared in the document, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_critical: Option<bool>,

    /// Document-wide context resolved for this step
    pub execution: StepExecution,
}

impl ActionStep {
    /// Look up a single input value
    pub fn input(&self, key: &str) -> Option<&serde_json::Value> {
        self.inputs.get(key)
    }

    /// Look up a string input
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).and_then(|v| v.as_str())
    }
}
