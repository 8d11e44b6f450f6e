//! Module resolution.
//!
//! [`HostResolver`] is the host's native resolver (the `next` hook);
//! [`resolve_with_fallback`] wraps any host resolver with tsconfig path aliases
//! and TypeScript extension fallbacks.

pub mod alias;
pub mod exports;
pub mod extensions;
pub mod host;
pub mod pipeline;
pub mod tsconfig;

pub use alias::{AliasMatcher, AliasState, AliasTable};
pub use host::FsHostResolver;
pub use pipeline::resolve_with_fallback;

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How the host should evaluate a resolved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Module,
    #[serde(rename = "commonjs")]
    CommonJs,
}

impl ModuleFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::CommonJs => "commonjs",
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolutionResult {
    File { path: PathBuf, format: ModuleFormat },
    Builtin { name: String },
}

impl ResolutionResult {
    /// The resolved file, if this is not a builtin.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Builtin { .. } => None,
        }
    }

    #[must_use]
    pub fn format(&self) -> Option<ModuleFormat> {
        match self {
            Self::File { format, .. } => Some(*format),
            Self::Builtin { .. } => None,
        }
    }
}

/// Inputs of one resolution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// File containing the import, if any.
    pub requesting_file: Option<PathBuf>,
    /// Active export conditions (`import`, `require`, `node`, ...).
    pub conditions: BTreeSet<String>,
}

impl ResolutionContext {
    /// Context for an ESM import from `file`.
    #[must_use]
    pub fn import_from(file: impl Into<PathBuf>) -> Self {
        Self {
            requesting_file: Some(file.into()),
            conditions: ["import", "node"].into_iter().map(String::from).collect(),
        }
    }

    /// Add a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.insert(condition.into());
        self
    }

    /// Directory relative specifiers resolve against.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.requesting_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Resolution failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing exists at the location the specifier names.
    #[error("Cannot find module '{specifier}' imported from '{}'", parent.display())]
    NotFound { specifier: String, parent: PathBuf },

    /// Every fallback was exhausted.
    #[error("{}", unresolved_message(specifier, requesting_file.as_deref()))]
    Unresolved {
        specifier: String,
        requesting_file: Option<PathBuf>,
    },

    #[error("Package subpath '{subpath}' is not defined by \"exports\" in {}", package_json.display())]
    PackagePathNotExported {
        subpath: String,
        package_json: PathBuf,
    },

    #[error("Invalid package config {}: {message}", path.display())]
    InvalidPackageConfig { path: PathBuf, message: String },

    #[error("Unsupported URL scheme in '{specifier}'")]
    UnsupportedScheme { specifier: String },

    /// Failure reported by an embedding host.
    #[error("Failed to resolve '{specifier}': {message}")]
    Host { specifier: String, message: String },
}

impl ResolveError {
    /// Whether this failure should drive the fallback search.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn unresolved_message(specifier: &str, requesting_file: Option<&Path>) -> String {
    match requesting_file {
        Some(file) => format!("Cannot resolve '{specifier}' from '{}'", file.display()),
        None => format!("Cannot resolve '{specifier}'"),
    }
}

/// The host's native resolver.
pub trait HostResolver {
    fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError>;
}

impl<F> HostResolver for F
where
    F: Fn(&str, &ResolutionContext) -> Result<ResolutionResult, ResolveError>,
{
    fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError> {
        self(specifier, ctx)
    }
}
