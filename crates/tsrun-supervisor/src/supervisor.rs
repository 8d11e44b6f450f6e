//! Watch-and-restart supervisor.
//!
//! Every event source (file watches, stdin, OS signals, the child's exit,
//! the coalescing and grace timers) is drained by one `select!` loop, so
//! state transitions never interleave.

use crate::child::{exit_code, signal_name, ChildCommand, SupervisedChild, SIGHUP, SIGINT, SIGKILL, SIGTERM};
use crate::error::SupervisorError;
use crate::watch::{ChangeSink, FsWatchSet, IgnorePolicy};
use std::future::pending;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn};

/// Time a child gets to exit after SIGTERM before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(2000);

/// Event coalescing window.
const COALESCE_WINDOW_MS: u64 = 50;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[0;0H";

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub command: ChildCommand,
    /// Directory watched recursively.
    pub cwd: PathBuf,
    /// Extra paths whose parent directories are watched too.
    pub include: Vec<PathBuf>,
    /// Directory names ignored on top of the defaults.
    pub exclude: Vec<String>,
    pub clear_screen: bool,
    pub grace_period: Duration,
    pub coalesce_window: Duration,
    /// Read restart/quit commands from an interactive stdin.
    pub read_stdin: bool,
    /// Stop on SIGINT, SIGTERM and SIGHUP.
    pub handle_signals: bool,
    /// Install filesystem watches.
    pub watch_files: bool,
}

impl SupervisorOptions {
    #[must_use]
    pub fn new(command: ChildCommand, cwd: PathBuf) -> Self {
        Self {
            command,
            cwd,
            include: Vec::new(),
            exclude: Vec::new(),
            clear_screen: true,
            grace_period: DEFAULT_GRACE_PERIOD,
            coalesce_window: Duration::from_millis(COALESCE_WINDOW_MS),
            read_stdin: true,
            handle_signals: true,
            watch_files: true,
        }
    }

    #[must_use]
    pub fn with_include(mut self, include: Vec<PathBuf>) -> Self {
        self.include = include;
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    #[must_use]
    pub fn with_clear_screen(mut self, clear_screen: bool) -> Self {
        self.clear_screen = clear_screen;
        self
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// No stdin, no signal handlers, no screen clearing. Restarts only come
    /// from file changes (if watched) and the [`SupervisorHandle`].
    #[must_use]
    pub fn detached(mut self) -> Self {
        self.read_stdin = false;
        self.handle_signals = false;
        self.clear_screen = false;
        self
    }

    #[must_use]
    pub fn without_file_watch(mut self) -> Self {
        self.watch_files = false;
        self
    }
}

/// Supervisor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Restarting,
    Stopped,
}

/// Observable supervisor events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    State(SupervisorState),
    Spawned { generation: u64, pid: Option<u32> },
    Exited { generation: u64, code: i32 },
    ForceKilled { generation: u64 },
}

#[derive(Debug)]
enum Input {
    Changed(PathBuf),
    Trigger,
    Quit,
    Signal(i32),
}

/// Sends commands to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Input>,
}

impl SupervisorHandle {
    /// Request a restart, as a file change would.
    pub fn trigger(&self) -> bool {
        self.tx.send(Input::Trigger).is_ok()
    }

    /// Stop the supervisor; it exits with the last recorded child status.
    pub fn stop(&self) -> bool {
        self.tx.send(Input::Quit).is_ok()
    }
}

/// Watches files and keeps one child running, restarting it on change.
pub struct Supervisor {
    options: SupervisorOptions,
    state: SupervisorState,
    child: Option<SupervisedChild>,
    generation: u64,
    /// Guards entry to `Restarting`.
    restarting: bool,
    coalesce: Option<Pin<Box<Sleep>>>,
    grace: Option<Pin<Box<Sleep>>>,
    watchers: FsWatchSet,
    /// Status of the last child that exited on its own.
    last_code: i32,
    tx: mpsc::UnboundedSender<Input>,
    rx: mpsc::UnboundedReceiver<Input>,
    observer: Option<mpsc::UnboundedSender<Notice>>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("restarting", &self.restarting)
            .field("watchers", &self.watchers)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    #[must_use]
    pub fn new(options: SupervisorOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            options,
            state: SupervisorState::Idle,
            child: None,
            generation: 0,
            restarting: false,
            coalesce: None,
            grace: None,
            watchers: FsWatchSet::empty(),
            last_code: 0,
            tx,
            rx,
            observer: None,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Receive state transitions and child lifecycle events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run until stopped. Returns the exit code for this process:
    /// `128 + signal` for signals, otherwise the last recorded child status.
    pub async fn run(mut self) -> Result<i32, SupervisorError> {
        if self.options.handle_signals {
            self.tasks.push(spawn_signal_listener(self.tx.clone())?);
        }
        if self.options.read_stdin && std::io::stdin().is_terminal() {
            spawn_stdin_reader(self.tx.clone());
        }
        if self.options.watch_files {
            let tx = self.tx.clone();
            let sink: ChangeSink = Arc::new(move |path: PathBuf| {
                let _ = tx.send(Input::Changed(path));
            });
            let policy = IgnorePolicy::new(self.options.exclude.clone());
            self.watchers =
                FsWatchSet::start(&self.options.cwd, &self.options.include, &policy, &sink);
        }

        info!("Watching for changes...");
        self.start_child()?;

        let code = loop {
            tokio::select! {
                status = wait_child(&mut self.child) => self.on_exit(status),
                () = expire(&mut self.coalesce) => {
                    self.coalesce = None;
                    self.begin_restart();
                }
                () = expire(&mut self.grace) => {
                    self.grace = None;
                    self.on_grace_expired();
                }
                input = self.rx.recv() => match input {
                    Some(Input::Changed(path)) => {
                        debug!(path = %path.display(), "change");
                        self.request_restart();
                    }
                    Some(Input::Trigger) => self.request_restart(),
                    Some(Input::Quit) | None => break self.shutdown(None).await,
                    Some(Input::Signal(signal)) => break self.shutdown(Some(signal)).await,
                },
            }
        };

        Ok(code)
    }

    fn set_state(&mut self, state: SupervisorState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "supervisor state");
            self.state = state;
            self.notify(Notice::State(state));
        }
    }

    fn notify(&self, notice: Notice) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(notice);
        }
    }

    fn start_child(&mut self) -> Result<(), SupervisorError> {
        self.set_state(SupervisorState::Starting);
        let child = SupervisedChild::spawn(&self.options.command)?;
        self.generation += 1;
        self.notify(Notice::Spawned {
            generation: self.generation,
            pid: child.pid(),
        });
        self.child = Some(child);
        self.set_state(SupervisorState::Running);
        Ok(())
    }

    /// Respawn after a restart; a failed spawn leaves the supervisor
    /// watching so the next change can try again.
    fn respawn(&mut self) {
        if let Err(e) = self.start_child() {
            error!(error = %e, "Failed to restart child");
            self.set_state(SupervisorState::Running);
        }
    }

    fn request_restart(&mut self) {
        if self.restarting || self.state == SupervisorState::Stopped {
            debug!("restart already in progress");
            return;
        }
        if self.coalesce.is_none() {
            self.coalesce = Some(Box::pin(sleep(self.options.coalesce_window)));
        }
    }

    fn begin_restart(&mut self) {
        if self.restarting {
            return;
        }
        self.restarting = true;
        self.set_state(SupervisorState::Restarting);

        if self.options.clear_screen {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(CLEAR_SCREEN.as_bytes());
            let _ = stdout.flush();
        }
        info!("Restarting...");

        let Some(child) = self.child.as_mut() else {
            self.restarting = false;
            self.respawn();
            return;
        };
        if let Err(e) = child.signal(SIGTERM) {
            warn!(error = %e, "Failed to signal child");
        }
        self.grace = Some(Box::pin(sleep(self.options.grace_period)));
    }

    fn on_grace_expired(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if child.has_exited() {
            return;
        }
        warn!(
            grace_ms = u64::try_from(self.options.grace_period.as_millis()).unwrap_or(u64::MAX),
            "Child ignored SIGTERM, killing"
        );
        if let Err(e) = child.signal(SIGKILL) {
            warn!(error = %e, "Failed to kill child");
        }
        self.notify(Notice::ForceKilled {
            generation: self.generation,
        });
    }

    fn on_exit(&mut self, status: std::io::Result<ExitStatus>) {
        let code = match status {
            Ok(status) => exit_code(&status),
            Err(e) => {
                warn!(error = %e, "Failed to wait for child");
                1
            }
        };
        self.child = None;
        self.grace = None;
        self.notify(Notice::Exited {
            generation: self.generation,
            code,
        });

        if self.restarting {
            self.restarting = false;
            self.respawn();
        } else {
            self.last_code = code;
            info!(code, "Child exited, waiting for changes");
        }
    }

    async fn shutdown(&mut self, signal: Option<i32>) -> i32 {
        if let Some(signal) = signal {
            info!(signal = signal_name(signal), "Stopping");
        }
        self.coalesce = None;
        self.grace = None;
        self.watchers.close();

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.signal(SIGKILL) {
                warn!(error = %e, "Failed to kill child");
            }
            if let Ok(status) = child.wait().await {
                self.notify(Notice::Exited {
                    generation: self.generation,
                    code: exit_code(&status),
                });
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.set_state(SupervisorState::Stopped);

        signal.map_or(self.last_code, |s| 128 + s)
    }
}

async fn wait_child(child: &mut Option<SupervisedChild>) -> std::io::Result<ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

fn spawn_signal_listener(
    tx: mpsc::UnboundedSender<Input>,
) -> Result<JoinHandle<()>, SupervisorError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).map_err(SupervisorError::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(SupervisorError::Signal)?;
    let mut hangup = signal(SignalKind::hangup()).map_err(SupervisorError::Signal)?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => SIGINT,
            _ = terminate.recv() => SIGTERM,
            _ = hangup.recv() => SIGHUP,
        };
        let _ = tx.send(Input::Signal(received));
    }))
}

/// A line restarts the child; `q` quits.
///
/// Runs on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader(tx: mpsc::UnboundedSender<Input>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            let input = if line.trim() == "q" {
                Input::Quit
            } else {
                Input::Trigger
            };
            if tx.send(input).is_err() {
                break;
            }
        }
    });
}
