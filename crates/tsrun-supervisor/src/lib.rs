#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Child process management for tsrun.
//!
//! - [`relay`] runs the host runtime once, relaying signals and IPC
//! - [`supervisor`] keeps a child running and restarts it on file changes
//! - [`preload`] embeds the loader handed to the runtime
//!
//! Unix only: signals are delivered with `kill(2)` and the IPC channel is
//! installed with `dup2(2)`.

pub mod child;
pub mod error;
pub mod ipc;
pub mod preload;
pub mod relay;
pub mod supervisor;
pub mod watch;

pub use child::{exit_code, ChildCommand, SupervisedChild, PRELOAD_FLAG};
pub use error::{SupervisorError, WatchError};
pub use relay::{build_command, run, RunTarget, DEFAULT_TEST_GLOB};
pub use supervisor::{
    Notice, Supervisor, SupervisorHandle, SupervisorOptions, SupervisorState,
    DEFAULT_GRACE_PERIOD,
};
pub use watch::{FsWatchSet, IgnorePolicy};
