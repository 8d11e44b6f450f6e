pub mod load;
pub mod resolve;
pub mod run;
pub mod version;
pub mod watch;

use miette::Result;
use std::path::Path;
use tsrun_core::Config;

/// Exit code for a missing runtime executable.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code for command-level validation failures.
pub const EXIT_INVALID: i32 = 2;

/// Check that the configured runtime exists before spawning it.
///
/// Returns the exit code to stop with when it does not.
pub fn check_runtime(config: &Config) -> Option<i32> {
    let found = if Path::new(&config.runtime).components().count() > 1 {
        config.cwd.join(&config.runtime).is_file()
    } else {
        which::which(&config.runtime).is_ok()
    };
    if found {
        return None;
    }
    eprintln!("error: runtime '{}' not found", config.runtime);
    eprintln!("hint: install it or pass --runtime <PROGRAM>");
    Some(EXIT_NOT_FOUND)
}

/// Run `future` to completion on a fresh tokio runtime.
pub fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    use miette::IntoDiagnostic;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    Ok(runtime.block_on(future))
}
