//! tsconfig `paths` alias matching.
//!
//! The table is loaded at most once per matcher. A failed or absent load is
//! remembered as [`AliasState::Disabled`] and never retried, so a broken
//! tsconfig costs one warning instead of one parse per import.

use super::tsconfig::{load_paths, normalize, ResolvedPaths};
use crate::config::env_vars;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// One `paths` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AliasEntry {
    /// Text before `*` (the whole key when there is no `*`).
    prefix: String,
    /// Text after `*`; `None` for exact keys.
    suffix: Option<String>,
    replacements: Vec<String>,
}

/// Parsed alias table: patterns → ordered replacement patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    base: PathBuf,
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Build a table from resolved tsconfig paths.
    ///
    /// Keys with more than one `*` are ignored, as TypeScript does.
    #[must_use]
    pub fn new(resolved: ResolvedPaths) -> Self {
        let entries = resolved
            .paths
            .into_iter()
            .filter_map(|(key, replacements)| {
                let entry = match key.matches('*').count() {
                    0 => AliasEntry {
                        prefix: key,
                        suffix: None,
                        replacements,
                    },
                    1 => {
                        let (prefix, suffix) = key.split_once('*')?;
                        AliasEntry {
                            prefix: prefix.to_string(),
                            suffix: Some(suffix.to_string()),
                            replacements,
                        }
                    }
                    _ => return None,
                };
                Some(entry)
            })
            .collect();

        Self {
            base: resolved.base,
            entries,
        }
    }

    /// Number of patterns in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand a specifier into absolute candidate paths, in declaration order.
    #[must_use]
    pub fn matches(&self, spec: &str) -> Vec<String> {
        let Some((entry, captured)) = self.best_match(spec) else {
            return Vec::new();
        };

        entry
            .replacements
            .iter()
            .map(|replacement| {
                let substituted = match captured {
                    Some(star) => replacement.replacen('*', star, 1),
                    None => replacement.clone(),
                };
                normalize(&self.base.join(substituted))
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    /// Exact key first, then the wildcard with the longest prefix
    /// (ties broken by the longest suffix). Two patterns tied on both are
    /// the same key, so the result never depends on declaration order.
    fn best_match<'a>(&'a self, spec: &'a str) -> Option<(&'a AliasEntry, Option<&'a str>)> {
        if let Some(exact) = self
            .entries
            .iter()
            .find(|e| e.suffix.is_none() && e.prefix == spec)
        {
            return Some((exact, None));
        }

        let mut best: Option<(&AliasEntry, &str)> = None;
        for entry in &self.entries {
            let Some(suffix) = entry.suffix.as_deref() else {
                continue;
            };
            if spec.len() < entry.prefix.len() + suffix.len()
                || !spec.starts_with(entry.prefix.as_str())
                || !spec.ends_with(suffix)
            {
                continue;
            }
            let captured = &spec[entry.prefix.len()..spec.len() - suffix.len()];
            let better = match best {
                None => true,
                Some((current, _)) => {
                    let current_suffix = current.suffix.as_deref().unwrap_or("");
                    (entry.prefix.len(), suffix.len())
                        > (current.prefix.len(), current_suffix.len())
                }
            };
            if better {
                best = Some((entry, captured));
            }
        }

        best.map(|(entry, captured)| (entry, Some(captured)))
    }
}

/// Loaded or permanently disabled; an empty cell means not loaded yet.
#[derive(Debug)]
enum AliasSlot {
    Disabled,
    Loaded(AliasTable),
}

/// Observable state of an [`AliasMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasState {
    /// No lookup has happened yet.
    Uninitialized,
    /// No config, an unreadable config, or a config without `paths`.
    Disabled,
    /// A table is loaded.
    Loaded,
}

/// Lazily loaded alias table with failure caching.
#[derive(Debug)]
pub struct AliasMatcher {
    config_path: Option<PathBuf>,
    slot: OnceLock<AliasSlot>,
}

impl AliasMatcher {
    /// Matcher reading the given tsconfig on first use.
    #[must_use]
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            slot: OnceLock::new(),
        }
    }

    /// Matcher that never matches.
    #[must_use]
    pub fn disabled() -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(AliasSlot::Disabled);
        Self {
            config_path: None,
            slot,
        }
    }

    /// Matcher configured from `TSRUN_TSCONFIG_PATH`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            std::env::var_os(env_vars::TSCONFIG_PATH)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        )
    }

    /// Process-wide matcher configured from the environment.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<AliasMatcher> = OnceLock::new();
        GLOBAL.get_or_init(Self::from_env)
    }

    /// The configured tsconfig path, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Current state without triggering a load.
    #[must_use]
    pub fn state(&self) -> AliasState {
        match self.slot.get() {
            None => AliasState::Uninitialized,
            Some(AliasSlot::Disabled) => AliasState::Disabled,
            Some(AliasSlot::Loaded(_)) => AliasState::Loaded,
        }
    }

    /// The table, loading it on first call.
    pub fn table(&self) -> Option<&AliasTable> {
        match self.slot.get_or_init(|| self.load()) {
            AliasSlot::Loaded(table) => Some(table),
            AliasSlot::Disabled => None,
        }
    }

    /// Candidate replacements for a specifier; empty when disabled.
    pub fn matches(&self, spec: &str) -> Vec<String> {
        self.table()
            .map(|table| table.matches(spec))
            .unwrap_or_default()
    }

    fn load(&self) -> AliasSlot {
        let Some(path) = self.config_path.as_deref() else {
            return AliasSlot::Disabled;
        };

        match load_paths(path) {
            Ok(Some(resolved)) => {
                let table = AliasTable::new(resolved);
                debug!(config = %path.display(), patterns = table.len(), "Loaded path aliases");
                AliasSlot::Loaded(table)
            }
            Ok(None) => {
                debug!(config = %path.display(), "No compilerOptions.paths, aliasing disabled");
                AliasSlot::Disabled
            }
            Err(e) => {
                warn!(error = %e, "Failed to load tsconfig, path aliases disabled");
                AliasSlot::Disabled
            }
        }
    }
}
