#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod resolver;
pub mod specifier;
pub mod version;

pub use config::{Config, Preload};
pub use error::Error;
pub use hooks::{ModuleHooks, TypeScriptHooks};
pub use loader::{
    load_with_fallback, CommandTransformer, FsHostLoader, HostLoader, LoadContext, LoadError,
    LoadOutput, SourceMap, TransformDiagnostic, TransformError, TransformOptions,
    TransformOutput, Transformer,
};
pub use resolver::{
    resolve_with_fallback, AliasMatcher, AliasState, AliasTable, FsHostResolver, HostResolver,
    ModuleFormat, ResolutionContext, ResolutionResult, ResolveError,
};
pub use specifier::SpecifierKind;
pub use version::VERSION;
