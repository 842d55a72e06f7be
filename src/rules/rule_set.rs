// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rule-set specification and its compiled form.

use serde_json::{Map, Value};

use super::pattern::Matcher;
use super::RuleError;

/// Label of the implicit catch-all group.
pub const OTHER: &str = "other";

/// A rule specification as loaded: ordered `key -> target path` entries.
///
/// Keys are either `"label"` or `"kind|label"`; targets are `|`-joined
/// group paths such as `"Tracking|Pixels"`. Declaration order is the
/// first-match order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    entries: Vec<(String, String)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a rule-set JSON object, keeping key order.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RuleError> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(Self::from_map(map))
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, target)| {
                let target = match target {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, target)
            })
            .collect();
        Self { entries }
    }

    pub fn from_pairs<K, T>(pairs: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
        }
    }

    /// Append a rule; it is evaluated after every rule already present.
    pub fn push(&mut self, key: impl Into<String>, target: impl Into<String>) {
        self.entries.push((key.into(), target.into()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the set defines an explicit `"other"` entry.
    pub fn has_other(&self) -> bool {
        self.entries.iter().any(|(k, _)| k == OTHER)
    }
}

/// One compiled rule: both matchers must accept for the rule to fire.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub kind: Matcher,
    pub label: Matcher,
    pub target: Vec<String>,
}

impl CompiledRule {
    #[inline]
    pub fn matches(&self, kind: &str, label: &str) -> bool {
        self.kind.matches(kind) && self.label.matches(label)
    }
}

/// Ordered matcher list produced from a [`RuleSet`].
///
/// Compilation is pure: the same rule set always yields the same list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledRules {
    rules: Vec<CompiledRule>,
}

impl CompiledRules {
    /// Compile leniently: every pattern is accepted.
    pub fn compile(rule_set: &RuleSet) -> Self {
        let rules = rule_set
            .entries()
            .iter()
            .map(|(key, target)| {
                let (kind, label) = split_key(key);
                CompiledRule {
                    kind: Matcher::compile(kind),
                    label: Matcher::compile(label),
                    target: split_path(target),
                }
            })
            .collect();
        Self::with_catch_all(rules, rule_set)
    }

    /// Compile, failing on the first glob whose regex translation is invalid.
    pub fn compile_strict(rule_set: &RuleSet) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(rule_set.len() + 1);
        for (key, target) in rule_set.entries() {
            let (kind, label) = split_key(key);
            rules.push(CompiledRule {
                kind: Matcher::compile_strict(kind)?,
                label: Matcher::compile_strict(label)?,
                target: split_path(target),
            });
        }
        Ok(Self::with_catch_all(rules, rule_set))
    }

    fn with_catch_all(mut rules: Vec<CompiledRule>, rule_set: &RuleSet) -> Self {
        if !rule_set.has_other() {
            rules.push(CompiledRule {
                kind: Matcher::Any,
                label: Matcher::Literal(OTHER.to_string()),
                target: vec![OTHER.to_string()],
            });
        }
        Self { rules }
    }

    /// First rule accepting `(kind, label)`, in declaration order.
    pub fn first_match(&self, kind: &str, label: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.matches(kind, label))
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// `"kind|label"` -> `(kind, label)`, `"label"` -> `("", label)`.
///
/// Only the first two segments count: `"a|b|c"` is `("a", "b")`.
fn split_key(key: &str) -> (&str, &str) {
    let mut parts = key.split('|');
    match (parts.next(), parts.next()) {
        (Some(kind), Some(label)) => (kind, label),
        _ => ("", key),
    }
}

/// Split a `|`-joined target into path segments.
pub fn split_path(target: &str) -> Vec<String> {
    target.split('|').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_keeps_declaration_order() {
        let rules = RuleSet::from_json(br#"{
            "zeta": "Z",
            "EDProducer|alpha*": "Tracking|Pixels",
            "mid": "M"
        }"#)
        .unwrap();

        let keys: Vec<&str> = rules.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "EDProducer|alpha*", "mid"]);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(RuleSet::from_json(b"[1, 2]"), Err(RuleError::Parse(_))));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("EDProducer|hlt*"), ("EDProducer", "hlt*"));
        assert_eq!(split_key("hltPixels"), ("", "hltPixels"));
        assert_eq!(split_key("|hltPixels"), ("", "hltPixels"));
        assert_eq!(split_key("a|b|c"), ("a", "b"));
    }

    #[test]
    fn test_extra_key_segments_ignored() {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([("P|hltPixels|unused", "HLT")]));
        let rule = &compiled.rules()[0];

        assert!(rule.kind.matches("P"));
        assert!(rule.label.matches("hltPixels"));
        assert!(!rule.label.matches("hltPixels|unused"));
    }

    #[test]
    fn test_compile_appends_catch_all() {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([("hlt*", "HLT")]));

        assert_eq!(compiled.len(), 2);
        let last = compiled.rules().last().unwrap();
        assert!(last.kind.is_any());
        assert_eq!(last.label, Matcher::Literal("other".into()));
        assert_eq!(last.target, vec!["other"]);
    }

    #[test]
    fn test_explicit_other_suppresses_catch_all() {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([
            ("hlt*", "HLT"),
            ("other", "Overhead"),
        ]));

        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled.rules()[1].target, vec!["Overhead"]);
    }

    #[test]
    fn test_compile_kind_and_label() {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([(
            "EDProducer|hltPixel*",
            "Tracking|Pixels",
        )]));

        let rule = &compiled.rules()[0];
        assert_eq!(rule.kind, Matcher::Literal("EDProducer".into()));
        assert!(matches!(rule.label, Matcher::Glob(_)));
        assert_eq!(rule.target, vec!["Tracking", "Pixels"]);
    }

    #[test]
    fn test_first_match_wins() {
        let compiled = CompiledRules::compile(&RuleSet::from_pairs([
            ("hltPixelTracks", "Exact"),
            ("hltPixel*", "Broad"),
        ]));

        let hit = compiled.first_match("EDProducer", "hltPixelTracks").unwrap();
        assert_eq!(hit.target, vec!["Exact"]);
        let hit = compiled.first_match("EDProducer", "hltPixelVertices").unwrap();
        assert_eq!(hit.target, vec!["Broad"]);
        assert!(compiled.first_match("EDProducer", "hltEcal").is_none());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let set = RuleSet::from_pairs([("a*", "A"), ("T|b?", "B|C")]);
        assert_eq!(CompiledRules::compile(&set), CompiledRules::compile(&set));
    }

    #[test]
    fn test_compile_strict_reports_bad_glob() {
        let set = RuleSet::from_pairs([("ok*", "A"), ("bad[*", "B")]);
        assert!(CompiledRules::compile_strict(&set).is_err());
        assert_eq!(CompiledRules::compile(&set).len(), 3);
    }
}
