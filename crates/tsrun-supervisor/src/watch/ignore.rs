//! Which file changes trigger a restart.

use std::path::{Component, Path};

/// Directory names always excluded.
pub const DEFAULT_EXCLUDE: [&str; 7] = [
    "node_modules",
    "bower_components",
    "vendor",
    "dist",
    ".git",
    ".svn",
    ".hg",
];

/// Extensions whose changes restart the child.
pub const WATCHED_EXTENSIONS: [&str; 9] = [
    "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "json",
];

/// Exclusion policy for change events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePolicy {
    excluded: Vec<String>,
}

impl Default for IgnorePolicy {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl IgnorePolicy {
    /// The defaults plus the caller's exclusions.
    #[must_use]
    pub fn new(exclusions: Vec<String>) -> Self {
        let mut excluded: Vec<String> = DEFAULT_EXCLUDE.iter().map(|s| (*s).to_string()).collect();
        for exclusion in exclusions {
            let exclusion = exclusion
                .trim_start_matches("./")
                .trim_end_matches(['/', '\\']);
            if !exclusion.is_empty() && !excluded.iter().any(|e| e == exclusion) {
                excluded.push(exclusion.to_string());
            }
        }
        Self { excluded }
    }

    #[must_use]
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Whether a path (relative to `root` when under it) is ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &Path, root: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);

        let segment_excluded = relative.components().any(|c| match c {
            Component::Normal(name) => self
                .excluded
                .iter()
                .any(|excluded| name.to_str() == Some(excluded.as_str())),
            _ => false,
        });
        if segment_excluded {
            return true;
        }

        // Multi-segment exclusions such as `src/generated`.
        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if self.excluded.iter().any(|e| {
            e.contains('/')
                && (relative_str == *e
                    || relative_str.starts_with(&format!("{e}/"))
                    || relative_str.contains(&format!("/{e}/")))
        }) {
            return true;
        }

        match relative.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.starts_with('.') && name != "." && name != "..",
            None => false,
        }
    }

    /// Whether the extension is one that restarts the child.
    #[must_use]
    pub fn is_relevant(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext))
    }

    /// Relevant and not ignored.
    #[must_use]
    pub fn should_restart(&self, path: &Path, root: &Path) -> bool {
        Self::is_relevant(path) && !self.is_ignored(path, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> &'static Path {
        Path::new("/proj")
    }

    #[test]
    fn test_defaults_exclude_dependency_and_vcs_dirs() {
        let policy = IgnorePolicy::default();
        assert!(policy.is_ignored(Path::new("/proj/node_modules/x/index.js"), root()));
        assert!(policy.is_ignored(Path::new("/proj/packages/a/dist/a.js"), root()));
        assert!(policy.is_ignored(Path::new("/proj/.git/HEAD"), root()));
        assert!(!policy.is_ignored(Path::new("/proj/src/app.ts"), root()));
    }

    #[test]
    fn test_segment_match_is_exact() {
        let policy = IgnorePolicy::default();
        assert!(!policy.is_ignored(Path::new("/proj/distribution/a.ts"), root()));
        assert!(!policy.is_ignored(Path::new("/proj/src/vendors.ts"), root()));
    }

    #[test]
    fn test_hidden_files() {
        let policy = IgnorePolicy::default();
        assert!(policy.is_ignored(Path::new("/proj/src/.app.ts.swp"), root()));
        assert!(policy.is_ignored(Path::new("/proj/.eslintrc.json"), root()));
        assert!(!policy.is_ignored(Path::new("/proj/src/app.ts"), root()));
    }

    #[test]
    fn test_root_outside_prefix_is_not_ignored() {
        // The watch root itself may live under a hidden directory.
        let policy = IgnorePolicy::default();
        let root = Path::new("/home/u/.config/proj");
        assert!(!policy.is_ignored(&root.join("main.ts"), root));
    }

    #[test]
    fn test_caller_exclusions_extend_defaults() {
        let policy = IgnorePolicy::new(vec![
            "build/".into(),
            "./src/generated".into(),
            "dist".into(),
            String::new(),
        ]);
        assert_eq!(&policy.excluded()[..DEFAULT_EXCLUDE.len()], DEFAULT_EXCLUDE);
        assert_eq!(
            &policy.excluded()[DEFAULT_EXCLUDE.len()..],
            ["build", "src/generated"]
        );
        assert!(policy.is_ignored(Path::new("/proj/build/a.js"), root()));
        assert!(policy.is_ignored(Path::new("/proj/src/generated/api.ts"), root()));
        assert!(policy.is_ignored(Path::new("/proj/node_modules/x/index.js"), root()));
        assert!(policy.is_ignored(Path::new("/proj/.git/objects/ab.json"), root()));
        assert!(!policy.is_ignored(Path::new("/proj/src/app.ts"), root()));
    }

    #[test]
    fn test_relevant_extensions() {
        assert!(IgnorePolicy::is_relevant(Path::new("a.ts")));
        assert!(IgnorePolicy::is_relevant(Path::new("package.json")));
        assert!(!IgnorePolicy::is_relevant(Path::new("README.md")));
        assert!(!IgnorePolicy::is_relevant(Path::new("Makefile")));
    }

    #[test]
    fn test_should_restart() {
        let policy = IgnorePolicy::default();
        assert!(policy.should_restart(Path::new("/proj/src/a.mts"), root()));
        assert!(!policy.should_restart(Path::new("/proj/src/a.css"), root()));
        assert!(!policy.should_restart(Path::new("/proj/dist/a.js"), root()));
    }
}
