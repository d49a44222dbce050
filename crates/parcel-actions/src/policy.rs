//! Failure and criticality policies
//!
//! [`FailurePolicy`] decides whether a failed step halts the rest of the
//! document. [`CriticalStepPolicy`] decides which steps are critical;
//! the orchestrator also uses it to turn outcomes into an overall status.

use parcel_document::ActionStep;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// What to do after a step fails
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Attempt every remaining step
    #[default]
    ContinueOnFailure,
    /// Stop after any failed step
    StopOnFirstFailure,
    /// Stop only after a failed critical step
    StopOnCriticalFailure,
}

impl FailurePolicy {
    /// Whether a failure of a step with the given criticality halts execution
    pub fn halts_after_failure(&self, critical: bool) -> bool {
        match self {
            FailurePolicy::ContinueOnFailure => false,
            FailurePolicy::StopOnFirstFailure => true,
            FailurePolicy::StopOnCriticalFailure => critical,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailurePolicy::ContinueOnFailure => "continue-on-failure",
            FailurePolicy::StopOnFirstFailure => "stop-on-first-failure",
            FailurePolicy::StopOnCriticalFailure => "stop-on-critical-failure",
        };
        f.write_str(s)
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" | "continue-on-failure" => Ok(FailurePolicy::ContinueOnFailure),
            "stop" | "stop-on-first-failure" => Ok(FailurePolicy::StopOnFirstFailure),
            "stop-on-critical" | "stop-on-critical-failure" => {
                Ok(FailurePolicy::StopOnCriticalFailure)
            }
            other => Err(format!("unknown failure policy: {}", other)),
        }
    }
}

/// Predicate deciding whether a step is critical
pub trait CriticalStepPolicy: Send + Sync {
    fn is_critical(&self, step: &ActionStep) -> bool;
}

impl<F> CriticalStepPolicy for F
where
    F: Fn(&ActionStep) -> bool + Send + Sync,
{
    fn is_critical(&self, step: &ActionStep) -> bool {
        self(step)
    }
}

/// No step is critical
#[derive(Debug, Default, Clone)]
pub struct NoCriticalSteps;

impl CriticalStepPolicy for NoCriticalSteps {
    fn is_critical(&self, _step: &ActionStep) -> bool {
        false
    }
}

/// Every step is critical
#[derive(Debug, Default, Clone)]
pub struct AllStepsCritical;

impl CriticalStepPolicy for AllStepsCritical {
    fn is_critical(&self, _step: &ActionStep) -> bool {
        true
    }
}

/// Steps with the listed names are critical
#[derive(Debug, Default, Clone)]
pub struct CriticalByName(HashSet<String>);

impl CriticalByName {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }
}

impl CriticalStepPolicy for CriticalByName {
    fn is_critical(&self, step: &ActionStep) -> bool {
        self.0.contains(&step.name)
    }
}

/// Steps of the listed action types are critical
#[derive(Debug, Default, Clone)]
pub struct CriticalByActionType(HashSet<String>);

impl CriticalByActionType {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(types.into_iter().map(Into::into).collect())
    }
}

impl CriticalStepPolicy for CriticalByActionType {
    fn is_critical(&self, step: &ActionStep) -> bool {
        self.0.contains(&step.action_type)
    }
}

/// Uses the document's `critical` flag, falling back to another policy
pub struct DeclaredCritical {
    fallback: Box<dyn CriticalStepPolicy>,
}

impl DeclaredCritical {
    /// Undeclared steps are not critical
    pub fn new() -> Self {
        Self::with_fallback(NoCriticalSteps)
    }

    pub fn with_fallback(fallback: impl CriticalStepPolicy + 'static) -> Self {
        Self {
            fallback: Box::new(fallback),
        }
    }
}

impl Default for DeclaredCritical {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalStepPolicy for DeclaredCritical {
    fn is_critical(&self, step: &ActionStep) -> bool {
        step.declared_critical
            .unwrap_or_else(|| self.fallback.is_critical(step))
    }
}

impl fmt::Debug for DeclaredCritical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredCritical").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ad_hoc_step;

    #[test]
    fn test_failure_policy_halting() {
        assert!(!FailurePolicy::ContinueOnFailure.halts_after_failure(true));
        assert!(FailurePolicy::StopOnFirstFailure.halts_after_failure(false));
        assert!(FailurePolicy::StopOnCriticalFailure.halts_after_failure(true));
        assert!(!FailurePolicy::StopOnCriticalFailure.halts_after_failure(false));
    }

    #[test]
    fn test_failure_policy_parse_and_display() {
        for policy in [
            FailurePolicy::ContinueOnFailure,
            FailurePolicy::StopOnFirstFailure,
            FailurePolicy::StopOnCriticalFailure,
        ] {
            assert_eq!(policy.to_string().parse::<FailurePolicy>(), Ok(policy));
        }
        assert_eq!("stop".parse::<FailurePolicy>(), Ok(FailurePolicy::StopOnFirstFailure));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::ContinueOnFailure);
    }

    #[test]
    fn test_by_name_and_type() {
        let install = ad_hoc_step("install", "runShellScript");
        let validate = ad_hoc_step("validate", "writefile");

        let by_name = CriticalByName::new(["install"]);
        assert!(by_name.is_critical(&install));
        assert!(!by_name.is_critical(&validate));

        let by_type = CriticalByActionType::new(["writefile"]);
        assert!(!by_type.is_critical(&install));
        assert!(by_type.is_critical(&validate));
    }

    #[test]
    fn test_closure_policy() {
        let policy = |step: &ActionStep| step.name.starts_with("install");
        assert!(policy.is_critical(&ad_hoc_step("install-deps", "noop")));
        assert!(!policy.is_critical(&ad_hoc_step("validate", "noop")));
    }

    #[test]
    fn test_declared_critical() {
        let mut declared = ad_hoc_step("validate", "noop");
        declared.declared_critical = Some(true);
        let mut advisory = ad_hoc_step("install", "noop");
        advisory.declared_critical = Some(false);
        let undeclared = ad_hoc_step("install", "noop");

        let policy = DeclaredCritical::with_fallback(CriticalByName::new(["install"]));
        assert!(policy.is_critical(&declared));
        assert!(!policy.is_critical(&advisory));
        assert!(policy.is_critical(&undeclared));

        assert!(!DeclaredCritical::new().is_critical(&undeclared));
        assert!(AllStepsCritical.is_critical(&undeclared));
        assert!(!NoCriticalSteps.is_critical(&declared));
    }
}
