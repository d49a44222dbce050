//! Action document schema
//!
//! An action document is a JSON declaration of ordered steps. Each step
//! names an action type (e.g. "runShellScript", "writefile") and carries
//! an opaque `inputs` object interpreted only by that action.

use crate::{DocumentError, Result, SUPPORTED_SCHEMA_MAJOR};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A raw action document as shipped inside a package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionDocument {
    /// Schema version, e.g. "2.2"
    pub schema_version: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps to execute, in order
    #[serde(default)]
    pub main_steps: Vec<StepDeclaration>,
}

impl ActionDocument {
    /// Create an empty document with the given schema version
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            description: None,
            main_steps: Vec::new(),
        }
    }

    /// Decode a document from raw bytes without validating it
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Encode the document as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add a step
    pub fn with_step(mut self, step: StepDeclaration) -> Self {
        self.main_steps.push(step);
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the document structure
    pub fn validate(&self) -> Result<()> {
        let major = self.schema_version.split('.').next().unwrap_or_default();
        if major != SUPPORTED_SCHEMA_MAJOR {
            return Err(DocumentError::UnsupportedSchema(self.schema_version.clone()));
        }

        if self.main_steps.is_empty() {
            return Err(DocumentError::MissingField("mainSteps".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.main_steps.len());
        for (i, step) in self.main_steps.iter().enumerate() {
            step.validate().map_err(|e| match e {
                DocumentError::InvalidFieldValue { field, message } => {
                    DocumentError::InvalidFieldValue {
                        field: format!("mainSteps[{}].{}", i, field),
                        message,
                    }
                }
                DocumentError::MissingField(field) => {
                    DocumentError::MissingField(format!("mainSteps[{}].{}", i, field))
                }
                other => other,
            })?;

            if !seen.insert(step.name.as_str()) {
                return Err(DocumentError::DuplicateStep(step.name.clone()));
            }
        }

        Ok(())
    }

    /// Get all step names in order
    pub fn step_names(&self) -> Vec<&str> {
        self.main_steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A single step as written in the document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepDeclaration {
    /// Action type tag
    pub action: String,

    /// Step name, unique within the document
    pub name: String,

    /// Action-specific inputs
    #[serde(default = "empty_inputs")]
    pub inputs: serde_json::Value,

    /// Step timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Explicit criticality marker, consulted by the declared-critical policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,
}

fn empty_inputs() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl StepDeclaration {
    /// Create a new step declaration
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            name: name.into(),
            inputs: empty_inputs(),
            timeout_seconds: None,
            critical: None,
        }
    }

    /// Set a single input value
    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.inputs {
            map.insert(key.into(), value);
        }
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Mark the step critical (or explicitly advisory)
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = Some(critical);
        self
    }

    /// Validate the step
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DocumentError::MissingField("name".to_string()));
        }

        // Names become directory names under the orchestration dir
        if let Some(bad) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(DocumentError::InvalidFieldValue {
                field: "name".to_string(),
                message: format!("'{}' contains invalid character {:?}", self.name, bad),
            });
        }
        if self.name == "." || self.name == ".." {
            return Err(DocumentError::InvalidFieldValue {
                field: "name".to_string(),
                message: format!("'{}' is reserved", self.name),
            });
        }

        if self.action.is_empty() {
            return Err(DocumentError::MissingField("action".to_string()));
        }

        if !self.inputs.is_object() {
            return Err(DocumentError::InvalidFieldValue {
                field: "inputs".to_string(),
                message: "must be an object".to_string(),
            });
        }

        if self.timeout_seconds == Some(0) {
            return Err(DocumentError::InvalidFieldValue {
                field: "timeoutSeconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Well-known action type tags
pub mod actions {
    /// Run a shell script
    pub const RUN_SHELL_SCRIPT: &str = "runShellScript";
    /// Write a file
    pub const WRITEFILE: &str = "writefile";
}
