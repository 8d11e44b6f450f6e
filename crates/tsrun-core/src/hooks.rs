//! Module hooks registered with an embedding host.
//!
//! A host calls [`ModuleHooks::resolve`] and [`ModuleHooks::load`] for every
//! import, passing its own native implementation as `next`.

use crate::config::Config;
use crate::loader::{
    load_with_fallback, CommandTransformer, HostLoader, LoadContext, LoadError, LoadOutput,
    NoTransformer, Transformer,
};
use crate::resolver::{
    resolve_with_fallback, AliasMatcher, HostResolver, ResolutionContext, ResolutionResult,
    ResolveError,
};

/// Resolve and load hooks.
pub trait ModuleHooks: Send + Sync {
    fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
        next: &dyn HostResolver,
    ) -> Result<ResolutionResult, ResolveError>;

    fn load(
        &self,
        url: &str,
        ctx: &LoadContext,
        next: &dyn HostLoader,
    ) -> Result<LoadOutput, LoadError>;
}

/// Hooks that make TypeScript sources importable.
pub struct TypeScriptHooks {
    aliases: AliasMatcher,
    transformer: Box<dyn Transformer>,
}

impl TypeScriptHooks {
    #[must_use]
    pub fn new(aliases: AliasMatcher, transformer: Box<dyn Transformer>) -> Self {
        Self {
            aliases,
            transformer,
        }
    }

    /// Hooks configured from `Config` (alias tsconfig, transform command).
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let tsconfig = config.tsconfig_path.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                config.cwd.join(path)
            }
        });
        let transformer: Box<dyn Transformer> = match config
            .transform_cmd
            .as_deref()
            .and_then(CommandTransformer::new)
        {
            Some(command) => Box::new(command.with_disable_cache(config.no_cache)),
            None => Box::new(NoTransformer),
        };
        Self::new(AliasMatcher::new(tsconfig), transformer)
    }

    #[must_use]
    pub fn aliases(&self) -> &AliasMatcher {
        &self.aliases
    }

    #[must_use]
    pub fn transformer(&self) -> &dyn Transformer {
        self.transformer.as_ref()
    }
}

impl std::fmt::Debug for TypeScriptHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeScriptHooks")
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

impl ModuleHooks for TypeScriptHooks {
    fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
        next: &dyn HostResolver,
    ) -> Result<ResolutionResult, ResolveError> {
        resolve_with_fallback(specifier, ctx, &self.aliases, next)
    }

    fn load(
        &self,
        url: &str,
        ctx: &LoadContext,
        next: &dyn HostLoader,
    ) -> Result<LoadOutput, LoadError> {
        load_with_fallback(url, ctx, self.transformer.as_ref(), next)
    }
}
