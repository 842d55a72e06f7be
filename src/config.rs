// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the grouping engine.
//!
//! # Example
//!
//! ```
//! use grouping_engine::GroupingConfig;
//!
//! // Minimal config (uses defaults)
//! let config = GroupingConfig::default();
//! assert!(config.show_labels);
//! assert_eq!(config.drill_down_limit, 15);
//!
//! // Full config
//! let config = GroupingConfig {
//!     resource: Some("time_real".into()),
//!     show_labels: false,
//!     threshold: Some(0.001),
//!     ..Default::default()
//! };
//! ```

use std::sync::Arc;

use serde::Deserialize;

use crate::tree::ColourScheme;

/// Configuration for the grouping engine.
///
/// All fields have sensible defaults. At minimum, set `resource` to the
/// metric to aggregate before asking for a tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupingConfig {
    /// Active resource key (e.g., "time_real", "mem_alloc")
    #[serde(default)]
    pub resource: Option<String>,

    /// Show record labels on leaves (the "other" label is always shown)
    #[serde(default = "default_show_labels")]
    pub show_labels: bool,

    /// Skip records whose value is at most `threshold * total.events`
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Rows kept when a diff is focused on one group
    #[serde(default = "default_drill_down_limit")]
    pub drill_down_limit: usize,

    /// Comparison cache bound (oldest entries evicted first)
    #[serde(default = "default_comparison_cache_max_entries")]
    pub comparison_cache_max_entries: usize,

    /// Segment order for the stacked comparison view (case-insensitive)
    #[serde(default = "default_stack_priority")]
    pub stack_priority: Vec<String>,

    /// Reject rule sets containing globs that are not valid patterns
    #[serde(default)]
    pub strict_patterns: bool,
}

fn default_show_labels() -> bool { true }
fn default_drill_down_limit() -> usize { 15 }
fn default_comparison_cache_max_entries() -> usize { 256 }
fn default_stack_priority() -> Vec<String> {
    ["pixels", "tracking", "vertices", "unassigned"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            resource: None,
            show_labels: default_show_labels(),
            threshold: None,
            drill_down_limit: default_drill_down_limit(),
            comparison_cache_max_entries: default_comparison_cache_max_entries(),
            stack_priority: default_stack_priority(),
            strict_patterns: false,
        }
    }
}

/// Everything an aggregation depends on besides the records and rules.
///
/// Passed explicitly into every engine call instead of being read from
/// shared state.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationContext {
    /// Resource key to aggregate
    pub resource: String,
    /// Show record labels on leaves
    pub labels_visible: bool,
    /// Version of the compiled rule set the tree is built with
    pub rule_set_version: u64,
    /// Colour scheme applied to the primary tree
    pub colours: Option<Arc<ColourScheme>>,
    /// Noise filter, as a fraction of the total event count
    pub threshold: Option<f64>,
}

impl AggregationContext {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            labels_visible: true,
            rule_set_version: 0,
            colours: None,
            threshold: None,
        }
    }

    #[must_use]
    pub fn with_labels_visible(mut self, visible: bool) -> Self {
        self.labels_visible = visible;
        self
    }

    #[must_use]
    pub fn with_rule_set_version(mut self, version: u64) -> Self {
        self.rule_set_version = version;
        self
    }

    #[must_use]
    pub fn with_colours(mut self, colours: Arc<ColourScheme>) -> Self {
        self.colours = Some(colours);
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }
}
