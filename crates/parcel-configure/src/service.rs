//! Document execution service
//!
//! The seam between the configurator and document handling: turn raw
//! document bytes into steps, then hand those steps to a runner.

use async_trait::async_trait;
use parcel_actions::{ActionEngine, ExecutionResult, RunContext, StepRunner};
use parcel_document::{ActionStep, DocumentContext, DocumentParser};
use tracing::{debug, info};

/// Parses and executes action documents
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Parse raw document bytes into an ordered step list
    fn parse_document(
        &self,
        raw: &[u8],
        ctx: &DocumentContext,
    ) -> parcel_document::Result<Vec<ActionStep>>;

    /// Run parsed steps through `runner`
    async fn execute_document(
        &self,
        runner: &dyn StepRunner,
        steps: &[ActionStep],
        run: &RunContext,
    ) -> ExecutionResult;
}

/// [`DocumentService`] backed by [`DocumentParser`]
#[derive(Debug, Clone, Default)]
pub struct NativeDocumentService {
    parser: DocumentParser,
}

impl NativeDocumentService {
    /// Accept any action type; the runner dispatches
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject action types the engine has no registration for
    pub fn for_engine(engine: &ActionEngine) -> Self {
        Self {
            parser: DocumentParser::new().with_known_action_types(engine.action_names()),
        }
    }
}

#[async_trait]
impl DocumentService for NativeDocumentService {
    fn parse_document(
        &self,
        raw: &[u8],
        ctx: &DocumentContext,
    ) -> parcel_document::Result<Vec<ActionStep>> {
        let steps = self.parser.parse(raw, ctx)?;
        debug!(document = %ctx.document_id, steps = steps.len(), "Document parsed");
        Ok(steps)
    }

    async fn execute_document(
        &self,
        runner: &dyn StepRunner,
        steps: &[ActionStep],
        run: &RunContext,
    ) -> ExecutionResult {
        info!(
            document = %run.document_id,
            created = %run.created_date,
            steps = steps.len(),
            "Executing document"
        );
        runner.execute_steps(steps, run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_actions::create_engine_with_actions;
    use parcel_document::DocumentError;

    const DOC: &str = r#"{
        "schemaVersion": "2.2",
        "mainSteps": [
            { "action": "writefile", "name": "install", "inputs": { "path": "a.txt", "content": "a" } },
            { "action": "runShellScript", "name": "validate", "inputs": { "runCommand": "test -f a.txt" } }
        ]
    }"#;

    fn ctx() -> DocumentContext {
        DocumentContext::new("doc-1", "/orch", "/work/pkgA")
    }

    #[test]
    fn test_parse_with_engine_registry() {
        let service = NativeDocumentService::for_engine(&create_engine_with_actions());

        let steps = service.parse_document(DOC.as_bytes(), &ctx()).unwrap();
        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["install", "validate"]);
    }

    #[test]
    fn test_parse_rejects_unregistered_type() {
        let service = NativeDocumentService::for_engine(&create_engine_with_actions());
        let doc = DOC.replace("runShellScript", "runPowerShellScript");

        let err = service.parse_document(doc.as_bytes(), &ctx()).unwrap_err();
        assert!(matches!(err, DocumentError::UnknownActionType { .. }));

        assert!(NativeDocumentService::new()
            .parse_document(doc.as_bytes(), &ctx())
            .is_ok());
    }

    #[tokio::test]
    async fn test_execute_document_runs_steps() {
        let temp = tempfile::tempdir().unwrap();
        let engine = create_engine_with_actions();
        let service = NativeDocumentService::for_engine(&engine);
        let ctx = DocumentContext::new("doc-1", temp.path().join("orch"), temp.path());

        let steps = service.parse_document(DOC.as_bytes(), &ctx).unwrap();
        let results = service
            .execute_document(&engine, &steps, &RunContext::new("doc-1"))
            .await;

        assert!(results.all_succeeded());
        assert_eq!(results.len(), 2);
        assert!(temp.path().join("a.txt").exists());
    }
}
