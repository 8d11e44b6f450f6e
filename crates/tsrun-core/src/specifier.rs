//! Specifier classification.
//!
//! Classification is purely lexical: it only looks at the prefix of the
//! specifier and never touches the filesystem.

/// Kind of a module specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `.`
    Relative,
    /// `/x`, `file:///x`, `C:\x`, `\\server\share`
    Absolute,
    /// `lodash`, `@scope/pkg/sub`, `~/lib`
    Bare,
    /// `node:fs`, `data:...` and any other URL scheme
    Builtin,
}

impl SpecifierKind {
    /// Classify a specifier.
    #[must_use]
    pub fn classify(spec: &str) -> Self {
        if spec.starts_with('.') {
            return Self::Relative;
        }
        if is_absolute_path(spec) || spec.starts_with("file:") {
            return Self::Absolute;
        }
        if has_scheme(spec) {
            return Self::Builtin;
        }
        Self::Bare
    }

    /// Whether the alias table may be consulted for this kind.
    #[must_use]
    pub fn is_bare(self) -> bool {
        self == Self::Bare
    }
}

impl std::fmt::Display for SpecifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Relative => "relative",
            Self::Absolute => "absolute",
            Self::Bare => "bare",
            Self::Builtin => "builtin",
        };
        write!(f, "{s}")
    }
}

/// Check if a specifier is an absolute filesystem path.
pub(crate) fn is_absolute_path(spec: &str) -> bool {
    // Unix absolute
    if spec.starts_with('/') {
        return true;
    }

    // Windows absolute: C:\, D:/, etc.
    let bytes = spec.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return true;
    }

    // UNC path: \\server\share
    spec.starts_with("\\\\")
}

/// `scheme:` prefix per RFC 3986 (letter, then letters/digits/`+`/`-`/`.`).
///
/// Single-letter schemes are rejected so bare drive letters never count.
fn has_scheme(spec: &str) -> bool {
    let Some(colon) = spec.find(':') else {
        return false;
    };
    let scheme = &spec[..colon];
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
