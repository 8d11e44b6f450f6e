//! Child process lifecycle.

use crate::error::SupervisorError;
use crate::preload;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::debug;
use tsrun_core::Config;

/// Flag the host runtime uses to preload a module.
pub const PRELOAD_FLAG: &str = "--import";

/// Graceful termination.
pub const SIGTERM: i32 = libc::SIGTERM;
/// Forceful termination.
pub const SIGKILL: i32 = libc::SIGKILL;
pub const SIGINT: i32 = libc::SIGINT;
pub const SIGHUP: i32 = libc::SIGHUP;

/// What to run: program, arguments and extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ChildCommand {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// The configured runtime with the loader preloaded:
    /// `runtime <runtime_args..> [--import loader] <tail..>`.
    #[must_use]
    pub fn for_runtime(config: &Config, runtime_args: &[String], tail: Vec<String>) -> Self {
        let (loader, loader_env) = preload::resolve(config);
        let mut args = runtime_args.to_vec();
        if let Some(loader) = loader {
            args.push(PRELOAD_FLAG.to_string());
            args.push(loader);
        }
        args.extend(tail);

        let mut env = config.child_env();
        env.extend(loader_env);

        Self {
            program: config.runtime.clone(),
            args,
            env,
            cwd: Some(config.cwd.clone()),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// A tokio command with inherited stdio.
    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

/// A running (or exited) child process.
#[derive(Debug)]
pub struct SupervisedChild {
    child: Child,
    pid: Option<u32>,
    status: Option<ExitStatus>,
}

impl SupervisedChild {
    /// Spawn `spec` with inherited stdio.
    pub fn spawn(spec: &ChildCommand) -> Result<Self, SupervisorError> {
        Self::spawn_command(spec, spec.to_command())
    }

    pub(crate) fn spawn_command(
        spec: &ChildCommand,
        mut command: Command,
    ) -> Result<Self, SupervisorError> {
        let child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(program = %spec.program, pid, "spawned child");
        Ok(Self {
            child,
            pid,
            status: None,
        })
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether an exit has been observed.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.status.is_some()
    }

    /// Send `signal`. A no-op once the child has exited.
    pub fn signal(&mut self, signal: i32) -> std::io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.status = Some(status);
            return Ok(());
        }
        let Some(pid) = self.pid else {
            return Ok(());
        };
        send_signal(pid, signal)
    }

    /// Wait for exit. Returns the cached status when already observed.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.status = Some(status);
        Ok(status)
    }
}

fn send_signal(pid: u32, signal: i32) -> std::io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Ok(());
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(pid, signal) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Exit code for a finished child: its own code, or `128 + signal`.
#[must_use]
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Signal name for log output.
#[must_use]
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        libc::SIGINT => "SIGINT",
        libc::SIGTERM => "SIGTERM",
        libc::SIGKILL => "SIGKILL",
        libc::SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ChildCommand {
        ChildCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_for_runtime_preloads_loader() {
        let config = Config::new(PathBuf::from("/work"))
            .with_runtime(Some("node".into()))
            .with_tsconfig(Some(PathBuf::from("tsconfig.json")));
        let cmd = ChildCommand::for_runtime(
            &config,
            &["--inspect".to_string()],
            vec!["app.ts".into(), "--port".into()],
        );
        assert_eq!(cmd.program, "node");
        let loader = preload::loader_url();
        assert_eq!(
            cmd.args,
            vec!["--inspect", PRELOAD_FLAG, loader.as_str(), "app.ts", "--port"]
        );
        assert!(cmd
            .env
            .iter()
            .any(|(k, v)| k == "TSRUN_TSCONFIG_PATH" && v == "/work/tsconfig.json"));
        assert!(cmd.env.iter().any(|(k, _)| k == "TSRUN_EXECUTABLE"));
    }

    #[test]
    fn test_for_runtime_without_loader() {
        let config = Config::new(PathBuf::from("/work")).with_loader(Some(String::new()));
        let cmd = ChildCommand::for_runtime(&config, &[], vec!["a.ts".into()]);
        assert_eq!(cmd.args, vec!["a.ts"]);
    }

    #[tokio::test]
    async fn test_exit_code_propagates() {
        let mut child = SupervisedChild::spawn(&sh("exit 7")).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(&status), 7);
    }

    #[tokio::test]
    async fn test_signal_exit_code() {
        let mut child = SupervisedChild::spawn(&sh("sleep 30")).unwrap();
        child.signal(SIGTERM).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(&status), 128 + SIGTERM);
    }

    #[tokio::test]
    async fn test_signal_after_exit_is_noop() {
        let mut child = SupervisedChild::spawn(&sh("exit 0")).unwrap();
        child.wait().await.unwrap();
        assert!(child.has_exited());
        child.signal(SIGKILL).unwrap();
        child.signal(SIGKILL).unwrap();
        assert_eq!(exit_code(&child.wait().await.unwrap()), 0);
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(SIGINT), "SIGINT");
        assert_eq!(signal_name(SIGKILL), "SIGKILL");
    }
}
