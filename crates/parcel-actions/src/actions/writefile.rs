//! Write file action
//!
//! Writes content into the staged package tree. Supports:
//! - Plain or base64-encoded content
//! - Paths relative to the step's working directory
//! - Parent directory creation
//! - Permission setting

use crate::context::{ActionContext, ActionResult};
use crate::error::{ActionError, Result};
use crate::progress::Progress;
use crate::traits::Action;
use async_trait::async_trait;
use base64::Engine;
use parcel_document::actions::WRITEFILE;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Native file writing action
///
/// Inputs:
/// - `path` (required): Target file, relative paths resolve against the working directory
/// - `content` (optional): File contents (plain text)
/// - `contentBase64` (optional): Base64-encoded contents
/// - `mode` (optional): File permissions in octal (e.g. "0644")
/// - `createDirs` (optional): Create parent directories if missing, default true
pub struct WriteFileAction;

fn parse_mode(mode: &str) -> Result<u32> {
    u32::from_str_radix(mode, 8)
        .map_err(|_| ActionError::ValidationFailed(format!("Invalid octal mode: {}", mode)))
}

fn target_path(ctx: &ActionContext) -> Result<PathBuf> {
    let path = ctx
        .input_str("path")
        .ok_or_else(|| ActionError::MissingInput("path".to_string()))?;
    Ok(ctx.working_dir().join(path))
}

#[async_trait]
impl Action for WriteFileAction {
    fn name(&self) -> &str {
        WRITEFILE
    }

    fn description(&self) -> &str {
        "Write content to a file in the package tree"
    }

    fn required_inputs(&self) -> Vec<&str> {
        vec!["path"]
    }

    fn optional_inputs(&self) -> Vec<&str> {
        vec!["content", "contentBase64", "mode", "createDirs"]
    }

    fn validate(&self, ctx: &ActionContext) -> Result<()> {
        match ctx.input_str("path") {
            Some(p) if !p.is_empty() => {}
            Some(_) => {
                return Err(ActionError::InvalidInput("path must not be empty".to_string()))
            }
            None => return Err(ActionError::MissingInput("path".to_string())),
        }

        if ctx.input_str("content").is_none() && ctx.input_str("contentBase64").is_none() {
            return Err(ActionError::ValidationFailed(
                "Either content or contentBase64 must be set".to_string(),
            ));
        }

        if let Some(mode) = ctx.input_str("mode") {
            parse_mode(mode)?;
        }

        Ok(())
    }

    fn supports_dry_run(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let path = target_path(ctx)?;
        let step = ctx.step_name();
        let reporter = ctx.progress_reporter();

        reporter.report(Progress::new(
            step,
            10,
            format!("Writing to {}", path.display()),
        ));

        let content = if let Some(b64) = ctx.input_str("contentBase64") {
            base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| {
                    ActionError::ValidationFailed(format!("Invalid base64 content: {}", e))
                })?
        } else if let Some(plain) = ctx.input_str("content") {
            plain.as_bytes().to_vec()
        } else {
            return Err(ActionError::ValidationFailed("No content provided".to_string()));
        };

        if ctx.is_dry_run() {
            return Ok(ActionResult::success(format!(
                "DRY RUN: Would write {} bytes to {}",
                content.len(),
                path.display()
            )));
        }

        if ctx.input_bool("createDirs").unwrap_or(true) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    ActionError::ExecutionFailed(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        fs::write(&path, &content).await.map_err(|e| {
            ActionError::ExecutionFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            ))
        })?;

        if let Some(mode_str) = ctx.input_str("mode") {
            let mode = parse_mode(mode_str)?;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| {
                    ActionError::ExecutionFailed(format!(
                        "Failed to set permissions on {}: {}",
                        path.display(),
                        e
                    ))
                })?;
        }

        debug!(path = %path.display(), bytes = content.len(), "File written");

        Ok(ActionResult::success(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path.display()
        ))
        .with_output("bytesWritten", content.len())
        .with_output("path", path.display().to_string()))
    }
}
