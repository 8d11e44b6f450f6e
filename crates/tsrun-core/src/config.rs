use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variables shared between the front-end, the supervisor and the
/// loader running inside the child.
pub mod env_vars {
    /// Path to the tsconfig.json holding `compilerOptions.paths`.
    pub const TSCONFIG_PATH: &str = "TSRUN_TSCONFIG_PATH";
    /// `1` disables caching in the transform service.
    pub const DISABLE_CACHE: &str = "TSRUN_DISABLE_CACHE";
    /// Command line of the external transform service.
    pub const TRANSFORM_CMD: &str = "TSRUN_TRANSFORM_CMD";
    /// Host runtime executable.
    pub const RUNTIME: &str = "TSRUN_RUNTIME";
    /// Loader module pre-installed in the child. Empty disables the preload.
    pub const LOADER: &str = "TSRUN_LOADER";
    /// The tsrun executable the embedded loader calls back into.
    pub const EXECUTABLE: &str = "TSRUN_EXECUTABLE";
}

/// Host runtime used when none is configured.
pub const DEFAULT_RUNTIME: &str = "node";

/// Module handed to the runtime's preload flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    /// The loader shipped inside the tsrun binary.
    #[default]
    Embedded,
    /// A module specifier or URL chosen by the user.
    Module(String),
    /// Run the child without a preload.
    Disabled,
}

impl Preload {
    /// An empty value disables the preload, anything else names a module.
    #[must_use]
    pub fn parse(value: String) -> Self {
        if value.is_empty() {
            Self::Disabled
        } else {
            Self::Module(value)
        }
    }
}

/// Runtime configuration for the tsrun CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// tsconfig.json used for path aliases.
    pub tsconfig_path: Option<PathBuf>,

    /// Disable caching in the transform service.
    pub no_cache: bool,

    /// Host runtime executable (e.g. `node`).
    pub runtime: String,

    /// Loader handed to the runtime's preload flag.
    pub loader: Preload,

    /// Command line of the external transform service.
    pub transform_cmd: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            tsconfig_path: None,
            no_cache: false,
            runtime: DEFAULT_RUNTIME.to_string(),
            loader: Preload::Embedded,
            transform_cmd: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Build a config from `TSRUN_*` environment variables.
    #[must_use]
    pub fn from_env(cwd: PathBuf) -> Self {
        Self::from_lookup(cwd, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(cwd: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(cwd);

        if let Some(path) = lookup(env_vars::TSCONFIG_PATH).filter(|p| !p.is_empty()) {
            config.tsconfig_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup(env_vars::DISABLE_CACHE) {
            config.no_cache = is_truthy(&flag);
        }
        if let Some(runtime) = lookup(env_vars::RUNTIME).filter(|r| !r.is_empty()) {
            config.runtime = runtime;
        }
        if let Some(loader) = lookup(env_vars::LOADER) {
            config.loader = Preload::parse(loader);
        }
        config.transform_cmd = lookup(env_vars::TRANSFORM_CMD).filter(|c| !c.trim().is_empty());

        config
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the tsconfig path.
    #[must_use]
    pub fn with_tsconfig(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.tsconfig_path = path;
        }
        self
    }

    /// Disable transform caching.
    #[must_use]
    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache |= no_cache;
        self
    }

    /// Override the host runtime.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Option<String>) -> Self {
        if let Some(runtime) = runtime {
            self.runtime = runtime;
        }
        self
    }

    /// Override the preloaded loader. An empty string disables it.
    #[must_use]
    pub fn with_loader(mut self, loader: Option<String>) -> Self {
        if let Some(loader) = loader {
            self.loader = Preload::parse(loader);
        }
        self
    }

    /// Environment the child needs so its loader sees the same settings.
    ///
    /// The tsconfig path is made absolute against `cwd` so the child does not
    /// depend on its own working directory.
    #[must_use]
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(path) = &self.tsconfig_path {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                self.cwd.join(path)
            };
            env.push((
                env_vars::TSCONFIG_PATH.to_string(),
                absolute.to_string_lossy().into_owned(),
            ));
        }
        if self.no_cache {
            env.push((env_vars::DISABLE_CACHE.to_string(), "1".to_string()));
        }
        env
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
