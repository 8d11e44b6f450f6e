//! Load adapter.
//!
//! TypeScript sources are read, passed through the transform service and
//! returned with an inline source map; everything else goes to the host.

pub mod command;
pub mod source_map;
pub mod transform;

pub use command::CommandTransformer;
pub use source_map::inline_source_map;
pub use transform::{
    JsxMode, NoTransformer, SourceMap, TransformDiagnostic, TransformError, TransformOptions,
    TransformOutput, Transformer,
};

use crate::resolver::extensions::is_source_file;
use crate::resolver::ModuleFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Inputs of one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadContext {
    /// Format chosen by the resolver, if any.
    pub format: Option<ModuleFormat>,
}

/// Source handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutput {
    pub format: ModuleFormat,
    pub source: String,
}

/// Load failure.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transform reported errors or could not run.
    #[error("Failed to transform {}: {message}", path.display())]
    Transform { path: PathBuf, message: String },

    #[error("Invalid module URL '{url}'")]
    InvalidUrl { url: String },

    /// Failure reported by an embedding host.
    #[error("Failed to load '{url}': {message}")]
    Host { url: String, message: String },
}

/// The host's native loader.
pub trait HostLoader {
    fn load(&self, url: &str, ctx: &LoadContext) -> Result<LoadOutput, LoadError>;
}

impl<F> HostLoader for F
where
    F: Fn(&str, &LoadContext) -> Result<LoadOutput, LoadError>,
{
    fn load(&self, url: &str, ctx: &LoadContext) -> Result<LoadOutput, LoadError> {
        self(url, ctx)
    }
}

/// Reads files from disk without transforming them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHostLoader;

impl HostLoader for FsHostLoader {
    fn load(&self, url: &str, ctx: &LoadContext) -> Result<LoadOutput, LoadError> {
        let path = url_to_path(url)?.ok_or_else(|| LoadError::Host {
            url: url.to_string(),
            message: "only file: URLs can be loaded from disk".to_string(),
        })?;
        let source = read(&path)?;
        let format = ctx
            .format
            .unwrap_or_else(|| crate::resolver::host::format_of(&path));
        Ok(LoadOutput { format, source })
    }
}

/// Load `url`, transforming TypeScript sources and delegating everything
/// else to `next` unchanged.
pub fn load_with_fallback(
    url: &str,
    ctx: &LoadContext,
    transformer: &dyn Transformer,
    next: &dyn HostLoader,
) -> Result<LoadOutput, LoadError> {
    let path = match url_to_path(url)? {
        Some(path) if is_source_file(&path.to_string_lossy()) => path,
        _ => return next.load(url, ctx),
    };

    let source = read(&path)?;
    let file_path = path.to_string_lossy();
    let options = TransformOptions {
        sourcemap: true,
        jsx: (path.extension().and_then(|e| e.to_str()) == Some("tsx"))
            .then_some(JsxMode::Automatic),
    };

    debug!(file = %file_path, "transforming");
    let output = transformer
        .transform(&file_path, &source, options)
        .map_err(|e| LoadError::Transform {
            path: path.clone(),
            message: e.to_string(),
        })?;

    if let Some(first) = output.errors.first() {
        return Err(LoadError::Transform {
            path,
            message: first.message(),
        });
    }

    let code = match &output.map {
        Some(map) => inline_source_map(&output.code, map),
        None => output.code,
    };

    Ok(LoadOutput {
        format: output_format(&path, ctx.format),
        source: code,
    })
}

/// `.cts` is always CommonJS and `.mts` always ESM; other files keep the
/// caller's format, defaulting to ESM.
fn output_format(path: &Path, requested: Option<ModuleFormat>) -> ModuleFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("cts") => ModuleFormat::CommonJs,
        Some("mts") => ModuleFormat::Module,
        _ => requested.unwrap_or(ModuleFormat::Module),
    }
}

/// `Ok(None)` for URLs that are not local files.
fn url_to_path(url: &str) -> Result<Option<PathBuf>, LoadError> {
    if url.starts_with("file:") {
        return url::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .map(Some)
            .ok_or_else(|| LoadError::InvalidUrl {
                url: url.to_string(),
            });
    }
    if crate::specifier::is_absolute_path(url) {
        return Ok(Some(PathBuf::from(url)));
    }
    Ok(None)
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}
