//! Invocation phases, overall status and outcome aggregation

use crate::error::ConfigureError;
use parcel_actions::{CriticalStepPolicy, ExecutionResult};
use parcel_document::ActionStep;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of one configure invocation
///
/// `Staging → Parsing → Executing → Aggregating → terminal`. Staging and
/// parsing failures jump straight to `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfigurePhase {
    Staging,
    Parsing,
    Executing,
    Aggregating,
    Succeeded,
    Failed,
    PartiallyFailed,
}

impl ConfigurePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConfigurePhase::Succeeded | ConfigurePhase::Failed | ConfigurePhase::PartiallyFailed
        )
    }
}

impl fmt::Display for ConfigurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Overall status of an invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfigureStatus {
    Succeeded,
    Failed,
    PartiallyFailed,
}

impl From<ConfigureStatus> for ConfigurePhase {
    fn from(status: ConfigureStatus) -> Self {
        match status {
            ConfigureStatus::Succeeded => ConfigurePhase::Succeeded,
            ConfigureStatus::Failed => ConfigurePhase::Failed,
            ConfigureStatus::PartiallyFailed => ConfigurePhase::PartiallyFailed,
        }
    }
}

impl fmt::Display for ConfigureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reduce per-step outcomes to one status
///
/// Every step succeeded → `Succeeded`. A failed critical step, or no step
/// succeeding at all → `Failed`. Anything else → `PartiallyFailed`. Steps
/// that never ran count as not succeeded.
pub fn aggregate(
    steps: &[ActionStep],
    results: &ExecutionResult,
    critical: &dyn CriticalStepPolicy,
) -> ConfigureStatus {
    let critical_failed = steps.iter().any(|step| {
        results
            .get(&step.name)
            .is_some_and(|outcome| !outcome.is_success())
            && critical.is_critical(step)
    });
    if critical_failed {
        return ConfigureStatus::Failed;
    }

    let succeeded = steps
        .iter()
        .filter(|step| results.get(&step.name).is_some_and(|o| o.is_success()))
        .count();

    if succeeded == steps.len() && !steps.is_empty() {
        ConfigureStatus::Succeeded
    } else if succeeded == 0 {
        ConfigureStatus::Failed
    } else {
        ConfigureStatus::PartiallyFailed
    }
}

/// Everything an invocation produced
#[derive(Debug)]
pub struct ConfigureOutcome {
    pub status: ConfigureStatus,

    /// One entry per attempted step; empty when staging or parsing failed
    pub results: ExecutionResult,

    /// Terminal staging or parsing error
    pub error: Option<ConfigureError>,

    /// Some step asked for a reboot
    pub reboot_required: bool,

    /// Phases traversed, in order, ending with the terminal one
    pub phases: Vec<ConfigurePhase>,
}

impl ConfigureOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ConfigureStatus::Succeeded
    }

    /// Serializable summary, as written to `result.json`
    pub fn report(&self) -> OutcomeReport<'_> {
        OutcomeReport {
            status: self.status,
            phases: &self.phases,
            reboot_required: self.reboot_required,
            error: self.error.as_ref().map(ToString::to_string),
            error_kind: self.error.as_ref().map(ConfigureError::kind),
            results: &self.results,
        }
    }
}

/// JSON view of a [`ConfigureOutcome`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport<'a> {
    pub status: ConfigureStatus,
    pub phases: &'a [ConfigurePhase],
    pub reboot_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    pub results: &'a ExecutionResult,
}
