//! Document and step execution context
//!
//! Context values are document-wide: every step parsed from one document
//! shares the same bucket, prefix and correlation identifiers. Only the
//! orchestration and working directories are derived per step.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Addressing and correlation values supplied by the caller at parse time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    /// Root directory for step output (stdout/stderr, result files)
    pub orchestration_dir: PathBuf,

    /// Originating bucket for uploaded output
    #[serde(default)]
    pub bucket: String,

    /// Key prefix inside the bucket
    #[serde(default)]
    pub key_prefix: String,

    /// Correlating message identifier
    #[serde(default)]
    pub message_id: String,

    /// Correlating execution (document) identifier
    pub document_id: String,

    /// Working directory for steps that don't name their own
    pub default_working_dir: PathBuf,
}

impl DocumentContext {
    /// Create a context with the required fields
    pub fn new(
        document_id: impl Into<String>,
        orchestration_dir: impl Into<PathBuf>,
        default_working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orchestration_dir: orchestration_dir.into(),
            bucket: String::new(),
            key_prefix: String::new(),
            message_id: String::new(),
            document_id: document_id.into(),
            default_working_dir: default_working_dir.into(),
        }
    }

    /// Set the output bucket and key prefix
    pub fn with_bucket(mut self, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self.key_prefix = key_prefix.into();
        self
    }

    /// Set the message identifier
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Derive the execution context for one step
    ///
    /// `working_dir` is the step's own `workingDirectory` input, if any;
    /// relative values are resolved against the default working directory.
    pub fn for_step(&self, step_name: &str, working_dir: Option<&str>) -> StepExecution {
        let working_dir = match working_dir.filter(|d| !d.is_empty()) {
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => self.default_working_dir.join(dir),
            None => self.default_working_dir.clone(),
        };

        // An unset orchestration root stays unset for every step
        let orchestration_dir = if self.orchestration_dir.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            self.orchestration_dir.join(step_name)
        };

        StepExecution {
            orchestration_dir,
            bucket: self.bucket.clone(),
            key_prefix: self.key_prefix.clone(),
            message_id: self.message_id.clone(),
            document_id: self.document_id.clone(),
            working_dir,
        }
    }
}

/// Execution context injected into a single step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    /// Per-step output directory (`<orchestration_dir>/<step name>`)
    pub orchestration_dir: PathBuf,
    pub bucket: String,
    pub key_prefix: String,
    pub message_id: String,
    pub document_id: String,
    /// Resolved working directory
    pub working_dir: PathBuf,
}
