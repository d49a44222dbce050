//! Shell script action
//!
//! Runs `runCommand` through `sh -c` in the step's working directory.
//! Output is captured into `stdout` and `stderr` files under the step's
//! orchestration directory so it survives cleanup of the staging tree.

use crate::context::{ActionContext, ActionResult};
use crate::error::{ActionError, Result};
use crate::progress::Progress;
use crate::traits::Action;
use async_trait::async_trait;
use parcel_document::actions::RUN_SHELL_SCRIPT;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit codes a script uses to ask for a reboot after a successful run
pub const REBOOT_EXIT_CODES: [i32; 2] = [194, 3010];

/// Characters of captured output kept in the step result
const OUTPUT_LIMIT: usize = 2500;

/// Native shell script action
///
/// Inputs:
/// - `runCommand` (required): A command string, or a list of lines joined with newlines
/// - `environment` (optional): Map of extra environment variables
pub struct ShellScriptAction;

/// Join `runCommand` into one script body
fn script_body(ctx: &ActionContext) -> Result<String> {
    match ctx.input("runCommand") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Array(lines)) if !lines.is_empty() => lines
            .iter()
            .map(|line| {
                line.as_str().map(str::to_string).ok_or_else(|| {
                    ActionError::InvalidInput("runCommand lines must be strings".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(|lines| lines.join("\n")),
        Some(_) => Err(ActionError::InvalidInput(
            "runCommand must be a non-empty string or list of strings".to_string(),
        )),
        None => Err(ActionError::MissingInput("runCommand".to_string())),
    }
}

fn environment(ctx: &ActionContext) -> Result<Vec<(String, String)>> {
    match ctx.input("environment") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                Value::Number(_) | Value::Bool(_) => Ok((k.clone(), v.to_string())),
                _ => Err(ActionError::InvalidInput(format!(
                    "environment value for {} must be a scalar",
                    k
                ))),
            })
            .collect(),
        Some(_) => Err(ActionError::InvalidInput(
            "environment must be an object".to_string(),
        )),
    }
}

fn truncate(output: &str) -> String {
    match output.char_indices().nth(OUTPUT_LIMIT) {
        Some((idx, _)) => format!("{}...", &output[..idx]),
        None => output.to_string(),
    }
}

/// Persist captured output next to the step's other artifacts
async fn save_output(dir: &Path, stdout: &[u8], stderr: &[u8]) {
    if dir.as_os_str().is_empty() {
        return;
    }
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Failed to create orchestration directory");
        return;
    }
    for (name, bytes) in [("stdout", stdout), ("stderr", stderr)] {
        let path = dir.join(name);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            warn!(path = %path.display(), error = %e, "Failed to save script output");
        }
    }
}

#[async_trait]
impl Action for ShellScriptAction {
    fn name(&self) -> &str {
        RUN_SHELL_SCRIPT
    }

    fn description(&self) -> &str {
        "Run shell commands in the package working directory"
    }

    fn required_inputs(&self) -> Vec<&str> {
        vec!["runCommand"]
    }

    fn optional_inputs(&self) -> Vec<&str> {
        vec!["environment", "workingDirectory"]
    }

    fn validate(&self, ctx: &ActionContext) -> Result<()> {
        script_body(ctx)?;
        environment(ctx)?;
        Ok(())
    }

    fn supports_dry_run(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let script = script_body(ctx)?;
        let env = environment(ctx)?;
        let step = ctx.step_name();
        let working_dir = ctx.working_dir();

        if ctx.is_dry_run() {
            return Ok(ActionResult::success(format!(
                "DRY RUN: Would run {} line(s) in {}",
                script.lines().count(),
                working_dir.display()
            )));
        }

        ctx.progress_reporter()
            .report(Progress::new(step, 10, "Running script"));

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&script)
            .envs(env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if !working_dir.as_os_str().is_empty() {
            cmd.current_dir(working_dir);
        }

        info!(step = %step, working_dir = %working_dir.display(), "Running shell script");

        let output = cmd.output().await.map_err(|e| {
            ActionError::ExecutionFailed(format!("failed to spawn sh: {}", e))
        })?;

        save_output(ctx.orchestration_dir(), &output.stdout, &output.stderr).await;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            debug!(step = %step, stdout = %stdout, "Script stdout");
        }
        if !stderr.is_empty() {
            debug!(step = %step, stderr = %stderr, "Script stderr");
        }

        // Killed by a signal has no code
        let code = output.status.code().unwrap_or(-1);

        let result = if code == 0 {
            ActionResult::success("Script completed")
        } else if REBOOT_EXIT_CODES.contains(&code) {
            info!(step = %step, code, "Script requested a reboot");
            ActionResult::success(format!("Script completed, reboot requested ({})", code))
                .with_reboot()
        } else {
            ActionResult::failure(format!(
                "script exited with code {}: {}",
                code,
                truncate(stderr.trim())
            ))
        };

        Ok(result
            .with_exit_code(code)
            .with_output("stdout", truncate(&stdout))
            .with_output("stderr", truncate(&stderr)))
    }
}
