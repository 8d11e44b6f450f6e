//! `tsrun load` command implementation.

use super::EXIT_INVALID;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;
use tsrun_core::{Config, FsHostLoader, LoadContext, ModuleFormat, ModuleHooks, TypeScriptHooks};

/// Result for JSON output.
#[derive(Serialize)]
struct LoadResult {
    ok: bool,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ModuleFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print the source the loader hands to the runtime for `file`.
///
/// `format` is the one the resolver picked, when the caller knows it.
pub fn run(config: &Config, file: &Path, format: Option<&str>, json: bool) -> Result<i32> {
    let path = config.cwd.join(file);
    let url = path.to_string_lossy();
    let ctx = LoadContext {
        format: match format {
            Some("module") => Some(ModuleFormat::Module),
            Some("commonjs") => Some(ModuleFormat::CommonJs),
            _ => None,
        },
    };

    let hooks = TypeScriptHooks::from_config(config);
    let outcome = hooks.load(&url, &ctx, &FsHostLoader);
    let code = if outcome.is_ok() { 0 } else { EXIT_INVALID };

    if json {
        let result = match outcome {
            Ok(output) => LoadResult {
                ok: true,
                path: path.display().to_string(),
                format: Some(output.format),
                source: Some(output.source),
                error: None,
            },
            Err(e) => LoadResult {
                ok: false,
                path: path.display().to_string(),
                format: None,
                source: None,
                error: Some(e.to_string()),
            },
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        match outcome {
            Ok(output) => print!("{}", output.source),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(code)
}
