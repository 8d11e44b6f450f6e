//! Filesystem host resolver with Node ESM semantics.
//!
//! Supports:
//! - Relative, absolute and `file:` specifiers (exact files only)
//! - Bare specifiers with `node_modules` lookup
//! - package.json `exports` (root, subpaths, patterns, conditions), `main`
//! - `node:` builtins
//!
//! There is deliberately no extension probing and no directory index lookup:
//! those are the fallbacks layered on top by the resolution pipeline.

use super::exports::{self, ExportsLookup};
use super::tsconfig::normalize;
use super::{HostResolver, ModuleFormat, ResolutionContext, ResolutionResult, ResolveError};
use crate::specifier::SpecifierKind;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Resolves specifiers against the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHostResolver;

impl FsHostResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HostResolver for FsHostResolver {
    fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolveError> {
        let parent = ctx.base_dir();
        let not_found = || ResolveError::NotFound {
            specifier: specifier.to_string(),
            parent: parent.clone(),
        };

        if specifier.is_empty() {
            return Err(not_found());
        }

        let path = match SpecifierKind::classify(specifier) {
            SpecifierKind::Builtin => return resolve_builtin(specifier),
            SpecifierKind::Relative => parent.join(specifier),
            SpecifierKind::Absolute => file_path(specifier)?,
            SpecifierKind::Bare => {
                return resolve_bare(specifier, &parent, ctx)?.ok_or_else(not_found)
            }
        };

        let path = normalize(&path);
        trace!(specifier, path = %path.display(), "probe");
        if path.is_file() {
            Ok(file_result(&path))
        } else {
            Err(not_found())
        }
    }
}

fn resolve_builtin(specifier: &str) -> Result<ResolutionResult, ResolveError> {
    match specifier.strip_prefix("node:") {
        Some(name) if !name.is_empty() => Ok(ResolutionResult::Builtin {
            name: specifier.to_string(),
        }),
        _ => Err(ResolveError::UnsupportedScheme {
            specifier: specifier.to_string(),
        }),
    }
}

/// Filesystem path of an absolute path or `file:` URL specifier.
fn file_path(specifier: &str) -> Result<PathBuf, ResolveError> {
    if !specifier.starts_with("file:") {
        return Ok(PathBuf::from(specifier));
    }
    url::Url::parse(specifier)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| ResolveError::UnsupportedScheme {
            specifier: specifier.to_string(),
        })
}

/// Walk `node_modules` upward. `Ok(None)` means not found anywhere.
fn resolve_bare(
    specifier: &str,
    parent: &Path,
    ctx: &ResolutionContext,
) -> Result<Option<ResolutionResult>, ResolveError> {
    let (pkg_name, subpath) = parse_bare_specifier(specifier);
    if pkg_name.is_empty() || pkg_name == "@" {
        return Ok(None);
    }

    let mut current = Some(parent);
    while let Some(dir) = current {
        let pkg_dir = dir.join("node_modules").join(pkg_name);
        if pkg_dir.is_dir() {
            trace!(specifier, pkg_dir = %pkg_dir.display(), "found package");
            let resolved = match subpath {
                Some(sub) => resolve_package_subpath(&pkg_dir, sub, ctx)?,
                None => resolve_package_root(&pkg_dir, ctx)?,
            };
            if resolved.is_some() {
                return Ok(resolved);
            }
        }
        current = dir.parent();
    }

    Ok(None)
}

fn resolve_package_root(
    pkg_dir: &Path,
    ctx: &ResolutionContext,
) -> Result<Option<ResolutionResult>, ResolveError> {
    let pkg_json_path = pkg_dir.join("package.json");
    let pkg_json = read_package_json(&pkg_json_path)?;

    if let Some(pkg) = &pkg_json {
        match exports::lookup(pkg, ".", &ctx.conditions) {
            ExportsLookup::Target(target) => return Ok(existing_file(&pkg_dir.join(target))),
            ExportsLookup::NotExported => {
                return Err(ResolveError::PackagePathNotExported {
                    subpath: ".".to_string(),
                    package_json: pkg_json_path,
                })
            }
            ExportsLookup::NoExports => {}
        }

        if let Some(main) = pkg.get("main").and_then(Value::as_str) {
            if let Some(found) = existing_file(&pkg_dir.join(main)) {
                return Ok(Some(found));
            }
        }
    }

    Ok(existing_file(&pkg_dir.join("index.js")))
}

fn resolve_package_subpath(
    pkg_dir: &Path,
    subpath: &str,
    ctx: &ResolutionContext,
) -> Result<Option<ResolutionResult>, ResolveError> {
    let pkg_json_path = pkg_dir.join("package.json");
    if let Some(pkg) = read_package_json(&pkg_json_path)? {
        let exports_subpath = format!("./{subpath}");
        match exports::lookup(&pkg, &exports_subpath, &ctx.conditions) {
            ExportsLookup::Target(target) => return Ok(existing_file(&pkg_dir.join(target))),
            ExportsLookup::NotExported => {
                return Err(ResolveError::PackagePathNotExported {
                    subpath: exports_subpath,
                    package_json: pkg_json_path,
                })
            }
            ExportsLookup::NoExports => {}
        }
    }

    Ok(existing_file(&pkg_dir.join(subpath)))
}

fn read_package_json(path: &Path) -> Result<Option<Value>, ResolveError> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ResolveError::InvalidPackageConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn existing_file(path: &Path) -> Option<ResolutionResult> {
    let path = normalize(path);
    path.is_file().then(|| file_result(&path))
}

fn file_result(path: &Path) -> ResolutionResult {
    let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let format = format_of(&canonical);
    ResolutionResult::File {
        path: canonical,
        format,
    }
}

/// Format from the extension, else the nearest package.json `"type"`.
#[must_use]
pub fn format_of(path: &Path) -> ModuleFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mjs" | "mts") => return ModuleFormat::Module,
        Some("cjs" | "cts") => return ModuleFormat::CommonJs,
        _ => {}
    }

    let mut current = path.parent();
    while let Some(dir) = current {
        let pkg_json = dir.join("package.json");
        if let Ok(content) = std::fs::read_to_string(&pkg_json) {
            let module_type = serde_json::from_str::<Value>(&content)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_owned));
            return match module_type.as_deref() {
                Some("module") => ModuleFormat::Module,
                _ => ModuleFormat::CommonJs,
            };
        }
        current = dir.parent();
    }

    ModuleFormat::CommonJs
}

/// Split a bare specifier into package name and optional subpath.
///
/// `"lodash/fp"` → `("lodash", Some("fp"))`,
/// `"@scope/pkg/sub"` → `("@scope/pkg", Some("sub"))`.
fn parse_bare_specifier(spec: &str) -> (&str, Option<&str>) {
    let name_end = if spec.starts_with('@') {
        spec.match_indices('/').nth(1).map(|(i, _)| i)
    } else {
        spec.find('/')
    };

    match name_end {
        Some(i) => (&spec[..i], Some(&spec[i + 1..]).filter(|s| !s.is_empty())),
        None => (spec, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn ctx_in(dir: &Path) -> ResolutionContext {
        ResolutionContext::import_from(dir.join("main.ts"))
    }

    fn resolved_path(result: &ResolutionResult) -> PathBuf {
        result.path().unwrap().to_path_buf()
    }

    #[test]
    fn test_relative_exact_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("util.js"), "").unwrap();

        let result = FsHostResolver.resolve("./util.js", &ctx_in(dir.path())).unwrap();
        assert!(resolved_path(&result).ends_with("util.js"));
    }

    #[test]
    fn test_relative_no_extension_probing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("util.ts"), "").unwrap();

        let err = FsHostResolver
            .resolve("./util.js", &ctx_in(dir.path()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/index.js"), "").unwrap();

        let err = FsHostResolver.resolve("./lib", &ctx_in(dir.path())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_file_url() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.mjs");
        fs::write(&file, "").unwrap();
        let url = url::Url::from_file_path(&file).unwrap();

        let result = FsHostResolver
            .resolve(url.as_str(), &ResolutionContext::default())
            .unwrap();
        assert_eq!(result.format(), Some(ModuleFormat::Module));
    }

    #[test]
    fn test_builtins_and_schemes() {
        let ctx = ResolutionContext::default();
        assert_eq!(
            FsHostResolver.resolve("node:fs", &ctx).unwrap(),
            ResolutionResult::Builtin {
                name: "node:fs".into()
            }
        );
        assert!(matches!(
            FsHostResolver.resolve("data:text/javascript,1", &ctx),
            Err(ResolveError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_bare_main_and_type() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/lib");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{"main": "./main.js", "type": "module"}"#)
            .unwrap();
        fs::write(pkg.join("main.js"), "").unwrap();

        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        let result = FsHostResolver.resolve("lib", &ctx_in(&nested)).unwrap();
        assert!(resolved_path(&result).ends_with("main.js"));
        assert_eq!(result.format(), Some(ModuleFormat::Module));
    }

    #[test]
    fn test_bare_index_js_default() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/plain");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "").unwrap();

        let result = FsHostResolver.resolve("plain", &ctx_in(dir.path())).unwrap();
        assert!(resolved_path(&result).ends_with("index.js"));
        assert_eq!(result.format(), Some(ModuleFormat::CommonJs));
    }

    #[test]
    fn test_scoped_subpath_exports() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@scope/pkg");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(
            pkg.join("package.json"),
            r#"{"exports": {".": "./dist/index.js", "./feature": {"import": "./dist/feature.mjs"}}}"#,
        )
        .unwrap();
        fs::write(pkg.join("dist/feature.mjs"), "").unwrap();

        let result = FsHostResolver
            .resolve("@scope/pkg/feature", &ctx_in(dir.path()))
            .unwrap();
        assert!(resolved_path(&result).ends_with("feature.mjs"));

        let err = FsHostResolver
            .resolve("@scope/pkg/private", &ctx_in(dir.path()))
            .unwrap_err();
        assert!(matches!(err, ResolveError::PackagePathNotExported { .. }));
    }

    #[test]
    fn test_subpath_without_exports() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/lodash");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{"main": "lodash.js"}"#).unwrap();
        fs::write(pkg.join("fp.js"), "").unwrap();

        let result = FsHostResolver.resolve("lodash/fp.js", &ctx_in(dir.path())).unwrap();
        assert!(resolved_path(&result).ends_with("fp.js"));
        assert!(FsHostResolver
            .resolve("lodash/fp", &ctx_in(dir.path()))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_invalid_package_json() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/broken");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), "{ not json").unwrap();

        let err = FsHostResolver.resolve("broken", &ctx_in(dir.path())).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPackageConfig { .. }));
    }

    #[test]
    fn test_missing_package_is_not_found() {
        let dir = tempdir().unwrap();
        let err = FsHostResolver.resolve("nope", &ctx_in(dir.path())).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_bare_specifier() {
        assert_eq!(parse_bare_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_bare_specifier("lodash/fp"), ("lodash", Some("fp")));
        assert_eq!(parse_bare_specifier("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(
            parse_bare_specifier("@scope/pkg/a/b"),
            ("@scope/pkg", Some("a/b"))
        );
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_of(Path::new("/x/a.cts")), ModuleFormat::CommonJs);
        assert_eq!(format_of(Path::new("/x/a.mts")), ModuleFormat::Module);
    }
}
