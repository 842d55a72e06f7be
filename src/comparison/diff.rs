// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Differences between the primary tree and comparison trees.
//!
//! # Views
//!
//! ```text
//! unfocused   top-level groups, label order
//!             Tracking   prim 4.0   cmp 5.0   Δ +1.0   (or +25 %)
//!
//! focused     children of one top-level group, flattened one level
//!             when a child is itself a group, heaviest first,
//!             truncated to the drill-down limit
//! ```
//!
//! Nothing here mutates a tree; every call produces fresh tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::tree::{GroupNode, GroupTree};

use super::cache::ComparisonEntry;

/// Segment colour used when the primary tree has none for a label.
pub const DEFAULT_SEGMENT_COLOUR: &str = "#999";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("No comparison datasets are available")]
    NoComparisons,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRow {
    pub label: String,
    pub primary: f64,
    pub comparison: f64,
    pub delta: f64,
}

/// Rows of one comparison dataset against the primary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffTable {
    pub comparison: String,
    pub rows: Vec<DiffRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub focus: Option<String>,
    pub relative: bool,
    /// Primary labels shown, in display order
    pub labels: Vec<String>,
    /// Sum over every focused row before truncation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_total: Option<f64>,
    pub tables: Vec<DiffTable>,
}

/// Absolute difference, or percent of the primary when `relative`.
///
/// A zero primary yields a zero relative delta.
#[inline]
pub fn delta(primary: f64, comparison: f64, relative: bool) -> f64 {
    if relative {
        if primary == 0.0 {
            0.0
        } else {
            (comparison - primary) / primary * 100.0
        }
    } else {
        comparison - primary
    }
}

/// Label -> weight one level below `focus`, in first-seen order.
///
/// Group children are replaced by their own children; a label seen twice
/// keeps its first position and its last weight. Returns `None` if `focus`
/// is not a top-level group.
fn focused_weights(tree: &GroupTree, focus: &str) -> Option<Vec<(String, f64)>> {
    let group = tree.root.child_group(focus)?;

    let mut weights: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut put = |node: &GroupNode| match index.get(&node.label).copied() {
        Some(i) => weights[i].1 = node.weight,
        None => {
            index.insert(node.label.clone(), weights.len());
            weights.push((node.label.clone(), node.weight));
        }
    };

    for child in &group.children {
        if child.is_group() {
            child.children.iter().for_each(&mut put);
        } else {
            put(child);
        }
    }
    Some(weights)
}

/// Compare the primary tree against every comparison entry.
///
/// With `focus` set, rows are the focused group's flattened children,
/// heaviest first, capped at `limit`; comparison values come from each
/// entry's full tree by the same extraction. An unknown focus group yields
/// empty tables. Fails only when `comparisons` is empty.
pub fn diff(
    primary: &GroupTree,
    comparisons: &[Arc<ComparisonEntry>],
    focus: Option<&str>,
    relative: bool,
    limit: usize,
) -> Result<DiffReport, DiffError> {
    if comparisons.is_empty() {
        return Err(DiffError::NoComparisons);
    }

    let (primary_rows, focus_total) = match focus {
        None => (primary.top_level_weights().into_iter().collect(), None),
        Some(focus) => {
            let mut rows = focused_weights(primary, focus).unwrap_or_default();
            rows.sort_by(|a, b| b.1.total_cmp(&a.1));
            let total: f64 = rows.iter().map(|(_, w)| w).sum();
            rows.truncate(limit);
            (rows, Some(total))
        }
    };

    let tables = comparisons
        .iter()
        .map(|entry| {
            let values: BTreeMap<String, f64> = match focus {
                None => entry.top_level_weights.clone(),
                Some(focus) => focused_weights(&entry.tree, focus)
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
            };
            let rows = primary_rows
                .iter()
                .map(|(label, primary)| {
                    let comparison = values.get(label).copied().unwrap_or(0.0);
                    DiffRow {
                        label: label.clone(),
                        primary: *primary,
                        comparison,
                        delta: delta(*primary, comparison, relative),
                    }
                })
                .collect();
            DiffTable {
                comparison: entry.name.clone(),
                rows,
            }
        })
        .collect();

    Ok(DiffReport {
        focus: focus.map(str::to_string),
        relative,
        labels: primary_rows.into_iter().map(|(label, _)| label).collect(),
        focus_total,
        tables,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// STACKED VIEW - One bar per dataset, one segment per top-level group
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedBar {
    pub dataset: String,
    /// Sum of the dataset's top-level group weights
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedSegment {
    pub label: String,
    pub color: String,
    /// One value per bar, in bar order
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedView {
    pub bars: Vec<StackedBar>,
    pub segments: Vec<StackedSegment>,
}

/// Priority labels (case-insensitive, in priority order) then the rest sorted.
fn order_segments(labels: Vec<String>, priority: &[String]) -> Vec<String> {
    let mut ordered = Vec::with_capacity(labels.len());
    for p in priority {
        if let Some(label) = labels.iter().find(|l| l.eq_ignore_ascii_case(p)) {
            ordered.push(label.clone());
        }
    }
    let mut rest: Vec<String> = labels
        .into_iter()
        .filter(|l| !priority.iter().any(|p| l.eq_ignore_ascii_case(p)))
        .collect();
    rest.sort();
    ordered.extend(rest);
    ordered
}

/// Stacked comparison of top-level groups across the primary and comparisons.
pub fn stacked_view(
    primary_name: &str,
    primary: &GroupTree,
    comparisons: &[Arc<ComparisonEntry>],
    priority: &[String],
) -> StackedView {
    let primary_weights = primary.top_level_weights();

    let mut bars = vec![StackedBar {
        dataset: primary_name.to_string(),
        total: primary_weights.values().sum(),
    }];
    bars.extend(comparisons.iter().map(|c| StackedBar {
        dataset: c.name.clone(),
        total: c.total,
    }));

    let mut labels: Vec<String> = primary_weights.keys().cloned().collect();
    for entry in comparisons {
        for label in entry.top_level_weights.keys() {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
    }

    let segments = order_segments(labels, priority)
        .into_iter()
        .map(|label| {
            let color = primary
                .root
                .child_group(&label)
                .and_then(|g| g.color.clone())
                .unwrap_or_else(|| DEFAULT_SEGMENT_COLOUR.to_string());
            let mut values = vec![primary_weights.get(&label).copied().unwrap_or(0.0)];
            values.extend(
                comparisons
                    .iter()
                    .map(|c| c.top_level_weights.get(&label).copied().unwrap_or(0.0)),
            );
            StackedSegment {
                label,
                color,
                values,
            }
        })
        .collect();

    StackedView { bars, segments }
}
