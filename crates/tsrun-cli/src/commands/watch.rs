//! `tsrun watch` command implementation.

use super::check_runtime;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tsrun_core::Config;
use tsrun_supervisor::{build_command, RunTarget, Supervisor, SupervisorOptions};

/// Exit code when watch mode is used without a script.
const EXIT_USAGE: i32 = 1;

/// Watch command arguments.
#[derive(Debug, Clone)]
pub struct WatchAction {
    pub script: Option<String>,
    pub args: Vec<String>,
    pub include: Vec<PathBuf>,
    pub exclude: Vec<String>,
    pub clear_screen: bool,
}

/// Supervise `script` until stopped; returns the supervisor's exit code.
pub fn run(config: &Config, node_args: &[String], action: WatchAction) -> Result<i32> {
    let Some(script) = action.script else {
        eprintln!("Error: watch mode requires a script path");
        return Ok(EXIT_USAGE);
    };
    if let Some(code) = check_runtime(config) {
        return Ok(code);
    }

    let target = RunTarget::Script {
        path: script,
        args: action.args,
    };
    let command = build_command(config, node_args, target, None).into_diagnostic()?;
    let options = SupervisorOptions::new(command, config.cwd.clone())
        .with_include(action.include)
        .with_exclude(action.exclude)
        .with_clear_screen(action.clear_screen);

    super::block_on(Supervisor::new(options).run())?.into_diagnostic()
}
