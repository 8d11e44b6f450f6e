//! package.json `exports` evaluation.
//!
//! Supports the string shorthand, the `"."` key, root-level condition
//! objects, exact subpath keys and single-`*` pattern keys. Conditions are
//! matched in the object's own key order against the active set, with
//! `default` always active.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Outcome of looking a subpath up in an `exports` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportsLookup {
    /// The package has no `exports` field.
    NoExports,
    /// `exports` maps the subpath to this `./`-relative target.
    Target(String),
    /// `exports` exists but does not expose the subpath.
    NotExported,
}

/// Look up `subpath` (`"."` for the package root, otherwise `"./x"`).
#[must_use]
pub fn lookup(pkg_json: &Value, subpath: &str, conditions: &BTreeSet<String>) -> ExportsLookup {
    let Some(exports) = pkg_json.get("exports") else {
        return ExportsLookup::NoExports;
    };

    let target = if subpath == "." {
        root_target(exports, conditions)
    } else {
        subpath_target(exports, subpath, conditions)
    };

    target.map_or(ExportsLookup::NotExported, ExportsLookup::Target)
}

fn root_target(exports: &Value, conditions: &BTreeSet<String>) -> Option<String> {
    if let Some(s) = exports.as_str() {
        return validate_target(s);
    }
    let obj = exports.as_object()?;
    if let Some(dot) = obj.get(".") {
        return resolve_target(dot, conditions);
    }
    if has_subpath_keys(obj) {
        return None;
    }
    // The whole object is a condition map for the root.
    resolve_target(exports, conditions)
}

fn subpath_target(exports: &Value, subpath: &str, conditions: &BTreeSet<String>) -> Option<String> {
    let obj = exports.as_object()?;
    if !has_subpath_keys(obj) {
        return None;
    }

    if let Some(exact) = obj.get(subpath) {
        return resolve_target(exact, conditions);
    }

    // Most specific pattern: longest key, lexicographic on ties.
    let (_, value, star) = obj
        .iter()
        .filter(|(key, _)| key.starts_with("./") && key.matches('*').count() == 1)
        .filter_map(|(key, value)| match_pattern(key, subpath).map(|star| (key, value, star)))
        .min_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)))?;

    let target = resolve_target(value, conditions)?;
    substitute_star(&target, star)
}

fn has_subpath_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with('.'))
}

/// String targets, condition objects (nested arbitrarily) and fallback arrays.
fn resolve_target(target: &Value, conditions: &BTreeSet<String>) -> Option<String> {
    match target {
        Value::String(s) => validate_target(s),
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| key.as_str() == "default" || conditions.contains(key.as_str()))
            .find_map(|(_, value)| resolve_target(value, conditions)),
        Value::Array(items) => items.iter().find_map(|v| resolve_target(v, conditions)),
        _ => None,
    }
}

fn match_pattern<'a>(pattern: &str, subpath: &'a str) -> Option<&'a str> {
    let (prefix, suffix) = pattern.split_once('*')?;
    if subpath.len() <= prefix.len() + suffix.len()
        || !subpath.starts_with(prefix)
        || !subpath.ends_with(suffix)
    {
        return None;
    }
    Some(&subpath[prefix.len()..subpath.len() - suffix.len()])
}

fn substitute_star(target: &str, star: &str) -> Option<String> {
    if target.matches('*').count() != 1 {
        return None;
    }
    validate_target(&target.replacen('*', star, 1))
}

/// Targets must be `./`-relative and must not escape the package.
fn validate_target(path: &str) -> Option<String> {
    if !path.starts_with("./") || path.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(path.to_string())
}
