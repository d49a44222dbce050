//! Document parser
//!
//! Turns raw document bytes plus a [`DocumentContext`] into an ordered,
//! immutable list of [`ActionStep`]s. Order in the source is the
//! execution order; nothing is reordered or deduplicated.

use crate::context::DocumentContext;
use crate::document::ActionDocument;
use crate::error::{DocumentError, Result};
use crate::step::ActionStep;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

/// Input key a step may use to override its working directory
pub const WORKING_DIRECTORY_INPUT: &str = "workingDirectory";

/// Parser for action documents
///
/// Without a registry the parser passes unknown action types through and
/// leaves dispatch errors to the runner. With one, unregistered types are
/// rejected up front.
#[derive(Debug, Clone, Default)]
pub struct DocumentParser {
    known_action_types: Option<BTreeSet<String>>,
}

impl DocumentParser {
    /// Create a pass-through parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict action types to the given set
    pub fn with_known_action_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_action_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Parse raw bytes into an ordered step list
    pub fn parse(&self, raw: &[u8], ctx: &DocumentContext) -> Result<Vec<ActionStep>> {
        let document = ActionDocument::from_slice(raw)?;
        self.resolve(document, ctx)
    }

    /// Validate an already decoded document and resolve its steps
    pub fn resolve(&self, document: ActionDocument, ctx: &DocumentContext) -> Result<Vec<ActionStep>> {
        document.validate()?;

        if let Some(known) = &self.known_action_types {
            if let Some(step) = document
                .main_steps
                .iter()
                .find(|s| !known.contains(&s.action))
            {
                return Err(DocumentError::UnknownActionType {
                    step: step.name.clone(),
                    action_type: step.action.clone(),
                });
            }
        }

        let steps: Vec<ActionStep> = document
            .main_steps
            .into_iter()
            .map(|decl| {
                let working_dir = decl
                    .inputs
                    .get(WORKING_DIRECTORY_INPUT)
                    .and_then(|v| v.as_str());
                let execution = ctx.for_step(&decl.name, working_dir);

                ActionStep {
                    execution,
                    timeout: decl.timeout_seconds.map(Duration::from_secs),
                    declared_critical: decl.critical,
                    name: decl.name,
                    action_type: decl.action,
                    inputs: decl.inputs,
                }
            })
            .collect();

        debug!(
            document = %ctx.document_id,
            steps = steps.len(),
            "Parsed action document"
        );

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> DocumentContext {
        DocumentContext::new("doc-1", "/orch", "/work/pkgA")
            .with_bucket("bucket", "prefix")
            .with_message_id("msg-1")
    }

    fn doc(steps: &[(&str, &str)]) -> Vec<u8> {
        let steps: Vec<serde_json::Value> = steps
            .iter()
            .map(|(name, action)| serde_json::json!({ "name": name, "action": action }))
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "schemaVersion": "2.2",
            "mainSteps": steps,
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_preserves_order() {
        let names = ["zeta", "alpha", "mid", "beta", "omega"];
        let raw = doc(&names.map(|n| (n, "noop")));

        let steps = DocumentParser::new().parse(&raw, &ctx()).unwrap();
        let parsed: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(parsed, names);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = doc(&[("install", "noop"), ("validate", "noop")]);
        let parser = DocumentParser::new();

        let first = parser.parse(&raw, &ctx()).unwrap();
        let second = parser.parse(&raw, &ctx()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_injects_context() {
        let raw = doc(&[("install", "noop"), ("validate", "noop")]);
        let steps = DocumentParser::new().parse(&raw, &ctx()).unwrap();

        for step in &steps {
            assert_eq!(step.execution.bucket, "bucket");
            assert_eq!(step.execution.key_prefix, "prefix");
            assert_eq!(step.execution.message_id, "msg-1");
            assert_eq!(step.execution.document_id, "doc-1");
            assert_eq!(step.execution.working_dir, PathBuf::from("/work/pkgA"));
        }
        assert_eq!(steps[0].execution.orchestration_dir, PathBuf::from("/orch/install"));
        assert_eq!(steps[1].execution.orchestration_dir, PathBuf::from("/orch/validate"));
    }

    #[test]
    fn test_parse_step_working_directory() {
        let raw = br#"{
            "schemaVersion": "2.2",
            "mainSteps": [
                { "action": "noop", "name": "a", "inputs": { "workingDirectory": "bin" } }
            ]
        }"#;

        let steps = DocumentParser::new().parse(raw, &ctx()).unwrap();
        assert_eq!(steps[0].execution.working_dir, PathBuf::from("/work/pkgA/bin"));
    }

    #[test]
    fn test_parse_timeout_and_critical() {
        let raw = br#"{
            "schemaVersion": "2.2",
            "mainSteps": [
                { "action": "noop", "name": "a", "timeoutSeconds": 90, "critical": true }
            ]
        }"#;

        let steps = DocumentParser::new().parse(raw, &ctx()).unwrap();
        assert_eq!(steps[0].timeout, Some(Duration::from_secs(90)));
        assert_eq!(steps[0].declared_critical, Some(true));
    }

    #[test]
    fn test_parse_duplicate_names() {
        let raw = doc(&[("install", "noop"), ("install", "noop")]);
        let err = DocumentParser::new().parse(&raw, &ctx()).unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(err, DocumentError::DuplicateStep(name) if name == "install"));
    }

    #[test]
    fn test_parse_malformed() {
        let err = DocumentParser::new().parse(b"{ not json", &ctx()).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
        assert!(!err.is_validation());

        let err = DocumentParser::new()
            .parse(br#"{"schemaVersion": 2}"#, &ctx())
            .unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_parse_unknown_type_rejected_with_registry() {
        let raw = doc(&[("install", "runShellScript"), ("fetch", "downloadContent")]);
        let parser = DocumentParser::new().with_known_action_types(["runShellScript", "writefile"]);

        let err = parser.parse(&raw, &ctx()).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            DocumentError::UnknownActionType { step, action_type }
                if step == "fetch" && action_type == "downloadContent"
        ));
    }

    #[test]
    fn test_parse_unknown_type_passes_without_registry() {
        let raw = doc(&[("fetch", "downloadContent")]);
        let steps = DocumentParser::new().parse(&raw, &ctx()).unwrap();
        assert_eq!(steps[0].action_type, "downloadContent");
    }
}
