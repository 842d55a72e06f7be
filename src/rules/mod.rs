// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Grouping rules: pattern compilation and record classification.
//!
//! # Rule Keys
//!
//! ```text
//! "hltPixelTracks"            - label literal, any kind
//! "EDProducer|hltPixel*"      - kind literal, label glob
//! "|hltEcal??"                - empty kind pattern matches any kind
//! ```
//!
//! Each key maps to a `|`-joined target path (`"Tracking|Pixels"`). Rules
//! are tried in declaration order and the first match wins. Unless the rule
//! set names `"other"` itself, a catch-all `(any, "other") -> "other"` rule
//! is appended.
//!
//! ```
//! use grouping_engine::rules::{CompiledRules, GroupClassifier, RuleSet};
//! use grouping_engine::Record;
//!
//! let rules = RuleSet::from_json(br#"{ "EDProducer|hltPixel*": "Tracking|Pixels" }"#).unwrap();
//! let compiled = CompiledRules::compile(&rules);
//! let classifier = GroupClassifier::new(&compiled);
//!
//! let c = classifier.classify(&Record::new("EDProducer", "hltPixelTracks"));
//! assert_eq!(c.path, vec!["Tracking", "Pixels", "EDProducer"]);
//! ```

mod classifier;
mod pattern;
mod rule_set;

use thiserror::Error;

pub use classifier::{Classification, GroupClassifier, UnassignedRecord, UNASSIGNED};
pub use pattern::Matcher;
pub use rule_set::{split_path, CompiledRule, CompiledRules, RuleSet, OTHER};

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Malformed rule-set JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Pattern '{pattern}' is not a valid glob: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
