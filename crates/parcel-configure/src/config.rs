//! Configurator settings

use parcel_actions::{
    AllStepsCritical, CriticalByName, CriticalStepPolicy, DeclaredCritical, FailurePolicy,
    NoCriticalSteps,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default root for per-invocation staging directories
pub const DEFAULT_STAGING_ROOT: &str = "/var/lib/parcel/staging";

/// How steps are classified as critical
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CriticalMode {
    /// No step is critical
    None,
    /// Every step is critical
    All,
    /// Only steps listed in `critical_steps`
    Named,
    /// The document's `critical` flag, then `critical_steps`
    #[default]
    Declared,
}

impl fmt::Display for CriticalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CriticalMode::None => "none",
            CriticalMode::All => "all",
            CriticalMode::Named => "named",
            CriticalMode::Declared => "declared",
        };
        f.write_str(s)
    }
}

impl FromStr for CriticalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CriticalMode::None),
            "all" => Ok(CriticalMode::All),
            "named" => Ok(CriticalMode::Named),
            "declared" => Ok(CriticalMode::Declared),
            other => Err(format!("unknown critical mode: {}", other)),
        }
    }
}

/// Configuration for a [`crate::PackageConfigurator`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfiguratorConfig {
    /// Parent of per-invocation staging directories
    pub staging_root: PathBuf,
    /// Halt behaviour after a failed step
    pub failure_policy: FailurePolicy,
    pub critical_mode: CriticalMode,
    /// Step names treated as critical by `Named` and `Declared`
    pub critical_steps: Vec<String>,
    /// Skip side effects in actions that support it
    pub dry_run: bool,
    /// Upper bound for steps that declare no timeout
    pub default_step_timeout_secs: Option<u64>,
}

impl Default for ConfiguratorConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from(DEFAULT_STAGING_ROOT),
            failure_policy: FailurePolicy::default(),
            critical_mode: CriticalMode::default(),
            critical_steps: Vec::new(),
            dry_run: false,
            default_step_timeout_secs: None,
        }
    }
}

impl ConfiguratorConfig {
    /// Build the critical-step predicate for this configuration
    pub fn critical_policy(&self) -> Arc<dyn CriticalStepPolicy> {
        let named = CriticalByName::new(self.critical_steps.iter().cloned());
        match self.critical_mode {
            CriticalMode::None => Arc::new(NoCriticalSteps),
            CriticalMode::All => Arc::new(AllStepsCritical),
            CriticalMode::Named => Arc::new(named),
            CriticalMode::Declared => Arc::new(DeclaredCritical::with_fallback(named)),
        }
    }
}
