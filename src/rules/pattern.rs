// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pattern matchers for rule keys.
//!
//! A pattern string compiles once, at rule-load time, into a [`Matcher`]:
//!
//! | Pattern        | Matcher          | Matches                       |
//! |----------------|------------------|-------------------------------|
//! | `""`           | `Any`            | every string                  |
//! | `hltPixels`    | `Literal`        | exactly `hltPixels`           |
//! | `hltPixel*`    | `Glob(^hltPixel.*$)` | `hltPixelTracks`, ...     |
//! | `a?c`          | `Glob(^a.c$)`    | `abc`, not `ac`               |
//!
//! Only `?` and `*` are translated; every other character goes into the
//! regex unchanged, so `.` in a glob matches any character.

use regex::Regex;
use tracing::warn;

use super::RuleError;

/// Compiled form of one pattern string.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Empty pattern: matches anything
    Any,
    /// Exact string equality
    Literal(String),
    /// Anchored regex translated from a `?`/`*` glob
    Glob(Regex),
}

impl Matcher {
    /// Compile a pattern, accepting every input.
    ///
    /// A glob that does not translate into a valid regex degrades to a
    /// literal match on the raw pattern text.
    pub fn compile(pattern: &str) -> Self {
        match Self::compile_strict(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!(pattern, error = %e, "Glob pattern is not a valid regex, matching it literally");
                Self::Literal(pattern.to_string())
            }
        }
    }

    /// Compile a pattern, rejecting globs whose regex translation is invalid.
    pub fn compile_strict(pattern: &str) -> Result<Self, RuleError> {
        if pattern.is_empty() {
            return Ok(Self::Any);
        }

        if is_glob(pattern) {
            let translated = glob_to_regex(pattern);
            return Regex::new(&translated)
                .map(Self::Glob)
                .map_err(|source| RuleError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                });
        }

        Ok(Self::Literal(pattern.to_string()))
    }

    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(literal) => literal == text,
            Self::Glob(regex) => regex.is_match(text),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, Self::Any) => true,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Glob(a), Self::Glob(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[inline]
fn is_glob(pattern: &str) -> bool {
    pattern.contains('?') || pattern.contains('*')
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '?' => out.push('.'),
            '*' => out.push_str(".*"),
            c => out.push(c),
        }
    }
    out.push('$');
    out
}
