//! Resolution pipeline: host first, then aliases, then extension fallbacks.

use super::extensions::{alias_candidates, fallback_candidates};
use super::{AliasMatcher, HostResolver, ResolutionContext, ResolutionResult, ResolveError};
use crate::specifier::SpecifierKind;
use tracing::trace;

/// Outcome of probing one candidate.
enum Probe {
    Hit(Result<ResolutionResult, ResolveError>),
    Miss,
}

fn probe(next: &dyn HostResolver, candidate: &str, ctx: &ResolutionContext) -> Probe {
    match next.resolve(candidate, ctx) {
        Err(e) if e.is_not_found() => {
            trace!(candidate, "not found");
            Probe::Miss
        }
        outcome => Probe::Hit(outcome),
    }
}

/// First candidate whose outcome is not "not found", success or failure.
fn first_hit(
    next: &dyn HostResolver,
    candidates: impl IntoIterator<Item = String>,
    ctx: &ResolutionContext,
) -> Option<Result<ResolutionResult, ResolveError>> {
    candidates
        .into_iter()
        .find_map(|candidate| match probe(next, &candidate, ctx) {
            Probe::Hit(outcome) => Some(outcome),
            Probe::Miss => None,
        })
}

/// Resolve `specifier`, falling back to tsconfig aliases and TypeScript
/// extensions when the host reports "not found".
///
/// Order:
/// 1. the host resolver with the specifier unchanged
/// 2. for bare specifiers, each alias replacement as-is, with source
///    extensions appended, then as a directory index
/// 3. extension mapping (`.js` → `.ts`, `.tsx`, ...)
/// 4. source extensions appended
/// 5. directory index
///
/// The first probe that does not fail with "not found" decides the result,
/// so a different error from any probe propagates unchanged.
pub fn resolve_with_fallback(
    specifier: &str,
    ctx: &ResolutionContext,
    aliases: &AliasMatcher,
    next: &dyn HostResolver,
) -> Result<ResolutionResult, ResolveError> {
    let kind = SpecifierKind::classify(specifier);
    if kind == SpecifierKind::Builtin {
        return next.resolve(specifier, ctx);
    }

    if let Probe::Hit(outcome) = probe(next, specifier, ctx) {
        return outcome;
    }

    if kind.is_bare() {
        for replacement in aliases.matches(specifier) {
            trace!(specifier, replacement = %replacement, "alias");
            if let Some(outcome) = first_hit(next, alias_candidates(&replacement), ctx) {
                return outcome;
            }
        }
    }

    if let Some(outcome) = first_hit(next, fallback_candidates(specifier), ctx) {
        return outcome;
    }

    Err(ResolveError::Unresolved {
        specifier: specifier.to_string(),
        requesting_file: ctx.requesting_file.clone(),
    })
}
