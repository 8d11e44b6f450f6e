//! The loader module shipped inside the binary.
//!
//! It is handed to the runtime as a `data:` URL, so nothing has to be
//! installed next to the script.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use tsrun_core::config::{env_vars, Preload};
use tsrun_core::Config;

/// Source of the embedded loader.
pub const LOADER_SOURCE: &str = include_str!("loader.mjs");

const DATA_URL_PREFIX: &str = "data:text/javascript;base64,";

/// The embedded loader as an importable `data:` URL.
#[must_use]
pub fn loader_url() -> String {
    format!("{DATA_URL_PREFIX}{}", STANDARD.encode(LOADER_SOURCE))
}

/// Preload argument and extra environment for `config.loader`.
pub(crate) fn resolve(config: &Config) -> (Option<String>, Vec<(String, String)>) {
    match &config.loader {
        Preload::Embedded => {
            let env = executable()
                .map(|exe| {
                    vec![(
                        env_vars::EXECUTABLE.to_string(),
                        exe.to_string_lossy().into_owned(),
                    )]
                })
                .unwrap_or_default();
            (Some(loader_url()), env)
        }
        Preload::Module(module) => (Some(module.clone()), Vec::new()),
        Preload::Disabled => (None, Vec::new()),
    }
}

fn executable() -> Option<PathBuf> {
    match std::env::current_exe() {
        Ok(exe) => Some(dunce::canonicalize(&exe).unwrap_or(exe)),
        Err(e) => {
            tracing::warn!(error = %e, "cannot locate the tsrun executable for the loader");
            None
        }
    }
}
