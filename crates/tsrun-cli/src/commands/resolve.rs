//! `tsrun resolve` command implementation.

use super::EXIT_INVALID;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;
use tsrun_core::{
    Config, FsHostResolver, ModuleHooks, ResolutionContext, ResolutionResult, TypeScriptHooks,
};

/// Result for JSON output.
#[derive(Serialize)]
struct ResolveResult<'a> {
    ok: bool,
    specifier: &'a str,
    from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Resolve `specifier` as an import in `from` (default `<cwd>/index.ts`).
pub fn run(
    config: &Config,
    specifier: &str,
    from: Option<PathBuf>,
    conditions: &[String],
    json: bool,
) -> Result<i32> {
    let from = match from {
        Some(path) if path.is_absolute() => path,
        Some(path) => config.cwd.join(path),
        None => config.cwd.join("index.ts"),
    };
    let ctx = conditions
        .iter()
        .fold(ResolutionContext::import_from(&from), |ctx, c| {
            ctx.with_condition(c.as_str())
        });

    let hooks = TypeScriptHooks::from_config(config);
    let outcome = hooks.resolve(specifier, &ctx, &FsHostResolver::new());

    if json {
        let (resolved, error) = match &outcome {
            Ok(resolved) => (Some(resolved.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let result = ResolveResult {
            ok: resolved.is_some(),
            specifier,
            from: from.display().to_string(),
            resolved,
            error,
        };
        println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
    } else {
        match &outcome {
            Ok(ResolutionResult::File { path, format }) => {
                println!("{} ({format})", path.display());
            }
            Ok(ResolutionResult::Builtin { name }) => println!("{name} (builtin)"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(if outcome.is_ok() { 0 } else { EXIT_INVALID })
}
