//! Extension fallback policy.
//!
//! Enumerates candidate specifiers for a specifier the host could not resolve.
//! Nothing here performs I/O; callers probe candidates in order and stop at
//! the first one the host accepts.

use std::collections::HashSet;

/// Extensions handled by the transform service, in probing order.
pub const SOURCE_EXTENSIONS: [&str; 4] = [".ts", ".tsx", ".mts", ".cts"];

const JS_ALTERNATES: [&str; 2] = [".ts", ".tsx"];
const MJS_ALTERNATES: [&str; 1] = [".mts"];
const CJS_ALTERNATES: [&str; 1] = [".cts"];

/// Ordered source alternates for an extension (`None` = no extension).
#[must_use]
pub fn alternates(ext: Option<&str>) -> &'static [&'static str] {
    match ext {
        None => &SOURCE_EXTENSIONS,
        Some(".js") => &JS_ALTERNATES,
        Some(".mjs") => &MJS_ALTERNATES,
        Some(".cjs") => &CJS_ALTERNATES,
        Some(_) => &[],
    }
}

/// Split a specifier into stem and the extension of its final segment.
///
/// `"./util.js"` → `("./util", Some(".js"))`, `"./lib"` → `("./lib", None)`.
/// Dotfiles and `.`/`..` segments have no extension.
#[must_use]
pub fn split_extension(spec: &str) -> (&str, Option<&str>) {
    let segment_start = spec.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let segment = &spec[segment_start..];

    match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let split = segment_start + dot;
            (&spec[..split], Some(&spec[split..]))
        }
        _ => (spec, None),
    }
}

/// Whether a path ends in one of the [`SOURCE_EXTENSIONS`].
#[must_use]
pub fn is_source_file(path: &str) -> bool {
    matches!(split_extension(path).1, Some(ext) if SOURCE_EXTENSIONS.contains(&ext))
}

/// Candidates from the extension mapping table.
pub fn mapped_candidates(spec: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = split_extension(spec);
    alternates(ext).iter().map(move |alt| format!("{stem}{alt}"))
}

/// The specifier with each source extension appended.
pub fn appended_candidates(spec: &str) -> impl Iterator<Item = String> + '_ {
    SOURCE_EXTENSIONS.iter().map(move |ext| format!("{spec}{ext}"))
}

/// The specifier treated as a directory containing `index.*`.
pub fn index_candidates(spec: &str) -> impl Iterator<Item = String> + '_ {
    let base = spec.trim_end_matches('/');
    SOURCE_EXTENSIONS
        .iter()
        .map(move |ext| format!("{base}/index{ext}"))
}

/// Mapped, appended, then index candidates, without repeats.
pub fn fallback_candidates(spec: &str) -> impl Iterator<Item = String> + '_ {
    let mut seen = HashSet::new();
    mapped_candidates(spec)
        .chain(appended_candidates(spec))
        .chain(index_candidates(spec))
        .filter(move |candidate| seen.insert(candidate.clone()))
}

/// An alias replacement as-is, then with extensions, then as a directory.
pub fn alias_candidates(replacement: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(replacement.to_string())
        .chain(appended_candidates(replacement))
        .chain(index_candidates(replacement))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("./util.js"), ("./util", Some(".js")));
        assert_eq!(split_extension("./lib"), ("./lib", None));
        assert_eq!(split_extension("../a.b/c"), ("../a.b/c", None));
        assert_eq!(split_extension("./.env"), ("./.env", None));
        assert_eq!(split_extension(".."), ("..", None));
        assert_eq!(split_extension("pkg/x.mjs"), ("pkg/x", Some(".mjs")));
    }

    #[test]
    fn test_mapped_js() {
        let got: Vec<_> = mapped_candidates("./util.js").collect();
        assert_eq!(got, vec!["./util.ts", "./util.tsx"]);
    }

    #[test]
    fn test_mapped_mjs_cjs() {
        assert_eq!(mapped_candidates("./a.mjs").collect::<Vec<_>>(), vec!["./a.mts"]);
        assert_eq!(mapped_candidates("./a.cjs").collect::<Vec<_>>(), vec!["./a.cts"]);
    }

    #[test]
    fn test_mapped_unknown_extension_is_empty() {
        assert_eq!(mapped_candidates("./data.json").count(), 0);
    }

    #[test]
    fn test_index_does_not_double_slash() {
        let got: Vec<_> = index_candidates("./lib/").collect();
        assert_eq!(
            got,
            vec![
                "./lib/index.ts",
                "./lib/index.tsx",
                "./lib/index.mts",
                "./lib/index.cts"
            ]
        );
    }

    #[test]
    fn test_fallback_order_extensionless() {
        let got: Vec<_> = fallback_candidates("./lib").collect();
        assert_eq!(
            got,
            vec![
                "./lib.ts",
                "./lib.tsx",
                "./lib.mts",
                "./lib.cts",
                "./lib/index.ts",
                "./lib/index.tsx",
                "./lib/index.mts",
                "./lib/index.cts",
            ]
        );
    }

    #[test]
    fn test_fallback_order_js() {
        let got: Vec<_> = fallback_candidates("./util.js").collect();
        assert_eq!(&got[..2], ["./util.ts", "./util.tsx"]);
        assert_eq!(&got[2..6], ["./util.js.ts", "./util.js.tsx", "./util.js.mts", "./util.js.cts"]);
        assert_eq!(got[6], "./util.js/index.ts");
        assert_eq!(got.len(), 10);
    }

    #[test]
    fn test_fallback_is_lazy() {
        let first = fallback_candidates("./util.js").next();
        assert_eq!(first.as_deref(), Some("./util.ts"));
    }

    #[test]
    fn test_alias_candidates_order() {
        let got: Vec<_> = alias_candidates("/proj/src/foo").collect();
        assert_eq!(got[0], "/proj/src/foo");
        assert_eq!(got[1], "/proj/src/foo.ts");
        assert_eq!(got[5], "/proj/src/foo/index.ts");
        assert_eq!(got.len(), 9);
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file("/a/b.ts"));
        assert!(is_source_file("/a/b.cts"));
        assert!(!is_source_file("/a/b.js"));
        assert!(!is_source_file("/a/ts"));
    }
}
