//! `tsrun [SCRIPT]` run mode.

use super::check_runtime;
use miette::{IntoDiagnostic, Result};
use tracing::debug;
use tsrun_core::{Config, Transformer, TypeScriptHooks};
use tsrun_supervisor::{build_command, RunTarget};

/// Run the runtime once and return its exit code.
pub fn run(config: &Config, node_args: &[String], target: RunTarget) -> Result<i32> {
    if let Some(code) = check_runtime(config) {
        return Ok(code);
    }

    let hooks = TypeScriptHooks::from_config(config);
    let transformer: Option<&dyn Transformer> = config
        .transform_cmd
        .as_ref()
        .map(|_| hooks.transformer());

    let command = build_command(config, node_args, target, transformer).into_diagnostic()?;
    debug!(program = %command.program, args = ?command.args, "running");

    super::block_on(tsrun_supervisor::run(&command))?.into_diagnostic()
}
