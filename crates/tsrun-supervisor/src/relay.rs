//! Process front-end: build the runtime command line, spawn one child and
//! report its exit.

use crate::child::{exit_code, signal_name, ChildCommand, SupervisedChild, SIGINT, SIGTERM};
use crate::error::SupervisorError;
use crate::ipc::IpcChannel;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};
use tsrun_core::{Config, TransformOptions, Transformer};

/// Test files picked up by `--test` when none are given.
pub const DEFAULT_TEST_GLOB: &str = "**/{test,test/**/*,test-*,*[.-_]test}.?(c|m)@(t|j)s";

/// Virtual file name for `--eval`/`--print` code.
pub const EVAL_FILE_NAME: &str = "/eval.ts";

/// What the runtime should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    Script { path: String, args: Vec<String> },
    Eval {
        code: String,
        print: bool,
        /// Forwarded as `--input-type` after the code.
        input_type: Option<String>,
    },
    Test { files: Vec<String> },
    Repl,
}

/// Runtime command line for `target`.
///
/// Eval code goes through `transformer` first when one is given.
pub fn build_command(
    config: &Config,
    runtime_args: &[String],
    target: RunTarget,
    transformer: Option<&dyn Transformer>,
) -> Result<ChildCommand, SupervisorError> {
    let tail = match target {
        RunTarget::Script { path, args } => std::iter::once(path).chain(args).collect(),
        RunTarget::Eval {
            code,
            print,
            input_type,
        } => {
            let code = match transformer {
                Some(transformer) => transform_eval(transformer, &code)?,
                None => code,
            };
            let flag = if print { "--print" } else { "--eval" };
            let mut tail = vec![flag.to_string(), code];
            if let Some(input_type) = input_type {
                tail.push(format!("--input-type={input_type}"));
            }
            tail
        }
        RunTarget::Test { files } => {
            let mut tail = vec!["--test".to_string()];
            if files.is_empty() {
                tail.push(DEFAULT_TEST_GLOB.to_string());
            } else {
                tail.extend(files);
            }
            tail
        }
        RunTarget::Repl => vec!["--interactive".to_string()],
    };
    Ok(ChildCommand::for_runtime(config, runtime_args, tail))
}

fn transform_eval(transformer: &dyn Transformer, code: &str) -> Result<String, SupervisorError> {
    let options = TransformOptions {
        sourcemap: false,
        jsx: None,
    };
    let output = transformer
        .transform(EVAL_FILE_NAME, code, options)
        .map_err(|e| SupervisorError::Transform(e.to_string()))?;
    if let Some(first) = output.errors.first() {
        return Err(SupervisorError::Transform(first.message()));
    }
    Ok(output.code)
}

/// Spawn `command` with inherited stdio and wait for it.
///
/// SIGINT and SIGTERM are relayed to the child. An inherited IPC channel is
/// bridged to the child's fd 3. Returns the child's code, or `128 + signal`.
pub async fn run(command: &ChildCommand) -> Result<i32, SupervisorError> {
    let mut interrupt = signal(SignalKind::interrupt()).map_err(SupervisorError::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(SupervisorError::Signal)?;

    let mut process = command.to_command();
    let channel = IpcChannel::from_env()?;
    if let Some(channel) = &channel {
        channel.configure(&mut process);
    }
    let mut child = SupervisedChild::spawn_command(command, process)?;
    let bridge = channel.map(IpcChannel::start).transpose()?;
    if bridge.is_some() {
        debug!("ipc bridge started");
    }

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = interrupt.recv() => forward(&mut child, SIGINT),
            _ = terminate.recv() => forward(&mut child, SIGTERM),
        }
    };
    if let Some(bridge) = bridge {
        bridge.close();
    }
    Ok(exit_code(&status))
}

fn forward(child: &mut SupervisedChild, signal: i32) {
    debug!(signal = signal_name(signal), "relaying signal to child");
    if let Err(e) = child.signal(signal) {
        warn!(error = %e, "Failed to relay signal");
    }
}
