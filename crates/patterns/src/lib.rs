#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `patterns` provides the include/exclude glob matcher that drives dotsync's
//! ignore and remove rules. A [`PatternSet`] holds two classes of patterns;
//! excludes always dominate includes, and a name that matches neither class is
//! not matched at all.
//!
//! # Design
//!
//! - Patterns are compiled to [`globset::GlobMatcher`] values at add time with
//!   `literal_separator(true)`, giving shell-style `*`, `?`, and `[…]`
//!   semantics in which wildcards never cross a `/`.
//! - Matching is a linear scan: excludes first (any hit wins and yields
//!   `false`), then includes. Order of insertion within a class is irrelevant.
//! - A pattern that fails to compile is absorbed: [`PatternSet::add`] drops it
//!   and the set behaves as if it was never added. This mirrors the rule-file
//!   format's tolerance for junk lines.
//!
//! # Examples
//!
//! ```
//! use patterns::PatternSet;
//!
//! let mut ps = PatternSet::new();
//! ps.add("*.txt", true);
//! ps.add("keep.txt", false);
//! assert!(ps.matches("notes.txt"));
//! assert!(!ps.matches("keep.txt"));
//! assert!(!ps.matches("notes.md"));
//! ```

use globset::{GlobBuilder, GlobMatcher};

/// A set of include and exclude glob patterns evaluated over relative paths.
#[derive(Debug, Default)]
pub struct PatternSet {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

#[derive(Debug)]
struct Pattern {
    text: String,
    matcher: GlobMatcher,
}

impl PatternSet {
    /// Creates an empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pattern` to the include class (`include == true`) or the exclude
    /// class. Invalid patterns are silently dropped.
    pub fn add(&mut self, pattern: &str, include: bool) {
        let Ok(glob) = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
        else {
            return;
        };
        let compiled = Pattern {
            text: pattern.to_owned(),
            matcher: glob.compile_matcher(),
        };
        if include {
            self.includes.push(compiled);
        } else {
            self.excludes.push(compiled);
        }
    }

    /// Reports whether `name` matches the set: `false` if any exclude matches,
    /// otherwise `true` if any include matches, otherwise `false`.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.excludes.iter().any(|p| p.matcher.is_match(name)) {
            return false;
        }
        self.includes.iter().any(|p| p.matcher.is_match(name))
    }

    /// Reports whether the set contains any patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Returns the texts of the include patterns, in insertion order.
    ///
    /// Callers that expand patterns against a live filesystem iterate these
    /// and re-filter the expansion through [`matches`](Self::matches) so that
    /// excludes still veto.
    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(|p| p.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(adds: &[(&str, bool)]) -> PatternSet {
        let mut ps = PatternSet::new();
        for (pattern, include) in adds {
            ps.add(pattern, *include);
        }
        ps
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(!PatternSet::new().matches("foo"));
    }

    #[test]
    fn exact_include() {
        let ps = set(&[("foo", true)]);
        assert!(ps.matches("foo"));
        assert!(!ps.matches("bar"));
    }

    #[test]
    fn wildcard_include() {
        let ps = set(&[("b*", true)]);
        assert!(!ps.matches("foo"));
        assert!(ps.matches("bar"));
        assert!(ps.matches("baz"));
    }

    #[test]
    fn exclude_dominates_include() {
        let ps = set(&[("b*", true), ("baz", false)]);
        assert!(ps.matches("bar"));
        assert!(!ps.matches("baz"));
        assert!(!ps.matches("foo"));
    }

    #[test]
    fn exclude_dominates_regardless_of_insertion_order() {
        let ps = set(&[("baz", false), ("b*", true)]);
        assert!(ps.matches("bar"));
        assert!(!ps.matches("baz"));
    }

    #[test]
    fn wildcards_do_not_cross_separators() {
        let ps = set(&[("*.txt", true)]);
        assert!(ps.matches("a.txt"));
        assert!(!ps.matches("dir/a.txt"));
        let ps = set(&[("dir/*.txt", true)]);
        assert!(ps.matches("dir/a.txt"));
        assert!(!ps.matches("dir/sub/a.txt"));
    }

    #[test]
    fn invalid_pattern_is_absorbed() {
        let ps = set(&[("[", true), ("ok", true)]);
        assert!(ps.matches("ok"));
        assert!(!ps.matches("["));
    }

    #[test]
    fn include_patterns_preserve_insertion_order() {
        let ps = set(&[("b", true), ("a", true), ("x", false)]);
        let texts: Vec<_> = ps.include_patterns().collect();
        assert_eq!(texts, ["b", "a"]);
    }

    #[test]
    fn character_classes() {
        let ps = set(&[("fo[ox]", true)]);
        assert!(ps.matches("foo"));
        assert!(ps.matches("fox"));
        assert!(!ps.matches("fob"));
    }
}
