//! tsconfig.json loading for path aliases.
//!
//! Only `compilerOptions.baseUrl` and `compilerOptions.paths` are read, but the
//! whole `extends` chain is followed so inherited aliases apply.

use crate::error::Error;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Raw tsconfig.json, reduced to what alias resolution needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfigJson {
    #[serde(default)]
    pub compiler_options: CompilerOptions,

    /// Base config(s) to extend from.
    #[serde(default)]
    pub extends: Option<Extends>,
}

/// `extends` is a single path or, since TypeScript 5.0, a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Base URL for non-relative module names.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path mapping for module resolution.
    #[serde(default)]
    pub paths: Option<PathMappings>,
}

/// `compilerOptions.paths` in declaration order.
///
/// Equally specific patterns are tried in the order the file lists them. A
/// repeated key keeps its last value and position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMappings(Vec<(String, Vec<String>)>);

impl PathMappings {
    /// Replacements declared for `pattern`.
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(key, _)| key == pattern)
            .map(|(_, replacements)| replacements.as_slice())
    }

    /// Patterns in declaration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, pattern: String, replacements: Vec<String>) {
        self.0.retain(|(key, _)| *key != pattern);
        self.0.push((pattern, replacements));
    }
}

impl FromIterator<(String, Vec<String>)> for PathMappings {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut mappings = Self::default();
        for (pattern, replacements) in iter {
            mappings.insert(pattern, replacements);
        }
        mappings
    }
}

impl IntoIterator for PathMappings {
    type Item = (String, Vec<String>);
    type IntoIter = std::vec::IntoIter<(String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for PathMappings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingsVisitor;

        impl<'de> Visitor<'de> for MappingsVisitor {
            type Value = PathMappings;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of path patterns to arrays of paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut mappings = PathMappings::default();
                while let Some((pattern, replacements)) = map.next_entry()? {
                    mappings.insert(pattern, replacements);
                }
                Ok(mappings)
            }
        }

        deserializer.deserialize_map(MappingsVisitor)
    }
}

/// Aliases with every relative location already made absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Directory replacements are resolved against.
    pub base: PathBuf,
    /// Pattern → replacements.
    pub paths: PathMappings,
}

impl TsConfigJson {
    /// Parse tsconfig.json text (comments and trailing commas allowed).
    pub fn parse(path: &Path, content: &str) -> Result<Self, Error> {
        let cleaned = strip_json_comments(content);
        serde_json::from_str(&cleaned).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a tsconfig.json file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }
}

/// Load the effective `paths` of a tsconfig, following `extends`.
///
/// Returns `Ok(None)` when no config in the chain declares `paths`.
pub fn load_paths(path: &Path) -> Result<Option<ResolvedPaths>, Error> {
    let mut visiting = HashSet::new();
    let layer = load_layer(path, &mut visiting)?;
    Ok(layer.paths.map(|(paths, paths_dir)| ResolvedPaths {
        base: layer.base_url.unwrap_or(paths_dir),
        paths,
    }))
}

/// Effective settings of one config after merging its bases.
#[derive(Default)]
struct Layer {
    base_url: Option<PathBuf>,
    /// Paths plus the directory of the config that declared them.
    paths: Option<(PathMappings, PathBuf)>,
}

fn load_layer(path: &Path, visiting: &mut HashSet<PathBuf>) -> Result<Layer, Error> {
    let key = normalize(path);
    if !visiting.insert(key.clone()) {
        return Err(Error::ExtendsCycle { path: key });
    }

    let config = TsConfigJson::load(path)?;
    let dir = normalize(path.parent().unwrap_or(Path::new(".")));

    // Later bases override earlier ones; the config itself overrides all.
    let mut layer = Layer::default();
    for extends in config.extends.map(Extends::into_vec).unwrap_or_default() {
        let base_path = resolve_extends_path(&dir, &extends).ok_or_else(|| {
            Error::ExtendsNotFound {
                path: path.to_path_buf(),
                extends: extends.clone(),
            }
        })?;
        let base = load_layer(&base_path, visiting)?;
        if base.base_url.is_some() {
            layer.base_url = base.base_url;
        }
        if base.paths.is_some() {
            layer.paths = base.paths;
        }
    }

    let options = config.compiler_options;
    if let Some(base_url) = options.base_url {
        layer.base_url = Some(normalize(&dir.join(base_url)));
    }
    if let Some(paths) = options.paths {
        layer.paths = Some((paths, dir));
    }

    visiting.remove(&key);
    Ok(layer)
}

/// Resolve the path from an "extends" field.
fn resolve_extends_path(base_dir: &Path, extends: &str) -> Option<PathBuf> {
    if extends.starts_with('.') || Path::new(extends).is_absolute() {
        let path = base_dir.join(extends);
        if path.is_file() {
            return Some(path);
        }
        let with_json = base_dir.join(format!("{extends}.json"));
        return with_json.is_file().then_some(with_json);
    }

    // Package reference: walk up looking in node_modules.
    let mut current = Some(base_dir);
    while let Some(dir) = current {
        let candidate = dir.join("node_modules").join(extends);
        if candidate.is_file() {
            return Some(candidate);
        }
        let nested = candidate.join("tsconfig.json");
        if nested.is_file() {
            return Some(nested);
        }
        let with_json = dir.join("node_modules").join(format!("{extends}.json"));
        if with_json.is_file() {
            return Some(with_json);
        }
        current = dir.parent();
    }
    None
}

/// Lexically normalize a path (drop `.`, fold `..`).
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Strip single-line and multi-line comments and trailing commas from JSON.
fn strip_json_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                while let Some(nc) = chars.next() {
                    if nc == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => result.push(c),
        }
    }

    strip_trailing_commas(&result)
}

/// Strip trailing commas from JSON arrays and objects.
fn strip_trailing_commas(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars.clone().find(|nc| !nc.is_whitespace());
            if matches!(next, Some(']' | '}')) {
                continue;
            }
        }
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_with_comments_and_trailing_commas() {
        let json = r#"
        {
            // line comment
            "compilerOptions": {
                "baseUrl": ".", /* block */
                "paths": { "@/*": ["./src/*",], },
            },
        }
        "#;

        let config = TsConfigJson::parse(Path::new("tsconfig.json"), json).unwrap();
        let paths = config.compiler_options.paths.unwrap();
        assert_eq!(paths.get("@/*"), Some(&["./src/*".to_string()][..]));
        assert_eq!(config.compiler_options.base_url.as_deref(), Some("."));
    }

    #[test]
    fn test_paths_keep_declaration_order() {
        let json = r#"{"compilerOptions": {"paths": {
            "z/*": ["./z/*"],
            "a/*": ["./a/*"],
            "m": ["./m.ts"],
            "a/*": ["./again/*"]
        }}}"#;
        let config = TsConfigJson::parse(Path::new("tsconfig.json"), json).unwrap();
        let paths = config.compiler_options.paths.unwrap();
        assert_eq!(paths.patterns().collect::<Vec<_>>(), ["z/*", "m", "a/*"]);
        assert_eq!(paths.get("a/*"), Some(&["./again/*".to_string()][..]));
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let json = r#"{"compilerOptions": {"paths": {"a//b": ["./x/*,"]}}}"#;
        let config = TsConfigJson::parse(Path::new("tsconfig.json"), json).unwrap();
        assert_eq!(
            config.compiler_options.paths.unwrap().get("a//b"),
            Some(&["./x/*,".to_string()][..])
        );
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = TsConfigJson::parse(Path::new("/p/tsconfig.json"), "{ nope").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("/p/tsconfig.json"));
    }

    #[test]
    fn test_load_paths_base_url() {
        let dir = tempdir().unwrap();
        let tsconfig = dir.path().join("tsconfig.json");
        fs::write(
            &tsconfig,
            r#"{"compilerOptions": {"baseUrl": "./src", "paths": {"~/*": ["lib/*"]}}}"#,
        )
        .unwrap();

        let resolved = load_paths(&tsconfig).unwrap().unwrap();
        assert_eq!(resolved.base, normalize(&dir.path().join("src")));
        assert_eq!(resolved.paths.get("~/*"), Some(&["lib/*".to_string()][..]));
    }

    #[test]
    fn test_load_paths_without_paths_is_none() {
        let dir = tempdir().unwrap();
        let tsconfig = dir.path().join("tsconfig.json");
        fs::write(&tsconfig, r#"{"compilerOptions": {"strict": true}}"#).unwrap();
        assert!(load_paths(&tsconfig).unwrap().is_none());
    }

    #[test]
    fn test_extends_inherits_paths_relative_to_base() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join("config/base.json"),
            r#"{"compilerOptions": {"paths": {"shared": ["../shared/index.ts"]}}}"#,
        )
        .unwrap();
        let tsconfig = dir.path().join("tsconfig.json");
        fs::write(&tsconfig, r#"{"extends": "./config/base"}"#).unwrap();

        let resolved = load_paths(&tsconfig).unwrap().unwrap();
        assert_eq!(resolved.base, dir.path().join("config"));
        assert!(resolved.paths.get("shared").is_some());
    }

    #[test]
    fn test_extends_from_node_modules() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@company/tsconfig");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("tsconfig.json"),
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"x": ["./x.ts"]}}}"#,
        )
        .unwrap();
        let tsconfig = dir.path().join("tsconfig.json");
        fs::write(&tsconfig, r#"{"extends": "@company/tsconfig"}"#).unwrap();

        let resolved = load_paths(&tsconfig).unwrap().unwrap();
        assert_eq!(resolved.base, pkg);
    }

    #[test]
    fn test_extends_cycle_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"extends": "./b.json"}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"extends": "./a.json"}"#).unwrap();

        let err = load_paths(&dir.path().join("a.json")).unwrap_err();
        assert!(matches!(err, Error::ExtendsCycle { .. }));
    }

    #[test]
    fn test_missing_extends_is_error() {
        let dir = tempdir().unwrap();
        let tsconfig = dir.path().join("tsconfig.json");
        fs::write(&tsconfig, r#"{"extends": "./missing"}"#).unwrap();
        assert!(matches!(
            load_paths(&tsconfig).unwrap_err(),
            Error::ExtendsNotFound { .. }
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }
}
