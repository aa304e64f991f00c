//! Glob matching capability.

use glob::{MatchOptions, Pattern};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Matches a `/`-separated relative path against a glob pattern.
pub trait Matcher: Send + Sync {
    fn matches(&self, path: &str, pattern: &str) -> bool;
}

/// `*` stays within one path segment, `**/` spans zero or more directories,
/// and wildcards skip dotfiles unless the pattern names the dot explicitly.
const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// [`Matcher`] backed by the `glob` crate, caching compiled patterns.
#[derive(Debug, Default)]
pub struct GlobMatcher {
    compiled: RwLock<FxHashMap<String, Option<Pattern>>>,
}

impl GlobMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Matcher for GlobMatcher {
    fn matches(&self, path: &str, pattern: &str) -> bool {
        if let Some(compiled) = self.compiled.read().get(pattern) {
            return compiled
                .as_ref()
                .is_some_and(|p| p.matches_with(path, OPTIONS));
        }

        // invalid patterns never match
        let compiled = Pattern::new(pattern).ok();
        let matched = compiled
            .as_ref()
            .is_some_and(|p| p.matches_with(path, OPTIONS));
        self.compiled.write().insert(pattern.to_owned(), compiled);
        matched
    }
}
