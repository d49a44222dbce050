//! Built-in action implementations
//!
//! # Available Actions
//!
//! - `runShellScript` - Run shell commands in the step's working directory
//! - `writefile` - Write a file relative to the step's working directory

mod shell;
mod writefile;

pub use shell::{ShellScriptAction, REBOOT_EXIT_CODES};
pub use writefile::WriteFileAction;

use crate::ActionEngine;

/// Register all built-in actions with the engine
pub fn register_all(engine: &mut ActionEngine) {
    engine.register(ShellScriptAction);
    engine.register(WriteFileAction);
}

/// Create an engine with all built-in actions pre-registered
pub fn create_engine_with_actions() -> ActionEngine {
    let mut engine = ActionEngine::new();
    register_all(&mut engine);
    engine
}
