//! Filesystem watches feeding the supervisor.
//!
//! One recursive watcher per root. Raw notify events are filtered here
//! (kind, extension, ignore policy) so the supervisor only sees paths that
//! should restart the child.

pub mod ignore;

pub use ignore::IgnorePolicy;

use crate::error::WatchError;
use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Receives every path that should trigger a restart.
pub type ChangeSink = Arc<dyn Fn(PathBuf) + Send + Sync>;

/// The active watches.
pub struct FsWatchSet {
    watchers: Vec<(PathBuf, RecommendedWatcher)>,
    closed: bool,
}

impl std::fmt::Debug for FsWatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatchSet")
            .field("roots", &self.roots())
            .field("closed", &self.closed)
            .finish()
    }
}

impl FsWatchSet {
    /// A set with nothing watched.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            watchers: Vec::new(),
            closed: false,
        }
    }

    /// Watch `cwd` and the parent directory of every include path.
    ///
    /// Roots that cannot be watched are logged and skipped.
    pub fn start(cwd: &Path, includes: &[PathBuf], policy: &IgnorePolicy, sink: &ChangeSink) -> Self {
        let mut set = Self::empty();
        for root in watch_roots(cwd, includes) {
            match watch_root(&root, policy.clone(), Arc::clone(sink)) {
                Ok(watcher) => {
                    info!(root = %root.display(), "Watching directory");
                    set.watchers.push((root, watcher));
                }
                Err(e) => warn!(root = %root.display(), error = %e, "Skipping watch root"),
            }
        }
        set
    }

    /// Directories being watched.
    #[must_use]
    pub fn roots(&self) -> Vec<&Path> {
        self.watchers.iter().map(|(root, _)| root.as_path()).collect()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop every watch. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let count = self.watchers.len();
        self.watchers.clear();
        debug!(count, "File watchers closed");
    }
}

impl Drop for FsWatchSet {
    fn drop(&mut self) {
        self.close();
    }
}

/// `cwd` plus the parent of each include, deduplicated, in order.
#[must_use]
pub fn watch_roots(cwd: &Path, includes: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots = vec![cwd.to_path_buf()];
    for include in includes {
        let absolute = if include.is_absolute() {
            include.clone()
        } else {
            cwd.join(include)
        };
        let parent = absolute
            .parent()
            .map_or_else(|| absolute.clone(), Path::to_path_buf);
        if !roots.contains(&parent) {
            roots.push(parent);
        }
    }
    roots
}

fn watch_root(
    root: &Path,
    policy: IgnorePolicy,
    sink: ChangeSink,
) -> Result<RecommendedWatcher, WatchError> {
    if !root.is_dir() {
        return Err(WatchError::InvalidRoot(root.to_path_buf()));
    }
    // Events arrive with canonical paths on some platforms.
    let canonical_root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let event_root = canonical_root.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if !should_process_event(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if policy.should_restart(&path, &event_root) {
                        debug!(path = %path.display(), "File changed");
                        sink(path);
                    }
                }
            }
            Err(e) => error!(error = %e, "Watch error"),
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    )
    .map_err(|e| WatchError::WatcherFailed(e.to_string()))?;

    watcher
        .watch(&canonical_root, RecursiveMode::Recursive)
        .map_err(|e| WatchError::WatcherFailed(e.to_string()))?;
    Ok(watcher)
}

/// Check if we should process this event.
fn should_process_event(event: &EventKind) -> bool {
    matches!(
        event,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(
                ModifyKind::Data(_)
                    | ModifyKind::Any
                    | ModifyKind::Name(RenameMode::To | RenameMode::From | RenameMode::Both)
            )
            | EventKind::Remove(RemoveKind::File | RemoveKind::Any)
    )
}
