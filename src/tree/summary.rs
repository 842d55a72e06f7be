// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Top-level summary table of a group tree.

use serde::Serialize;

use super::group_node::GroupTree;

/// One row of the top-level summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub label: String,
    pub value: f64,
    /// Share of the root weight, 0 when the root weighs nothing
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Top-level groups of `tree`, sorted by label.
pub fn summarize(tree: &GroupTree) -> Vec<SummaryRow> {
    let total = tree.weight();
    let mut rows: Vec<SummaryRow> = tree
        .root
        .groups()
        .map(|g| SummaryRow {
            label: g.label.clone(),
            value: g.weight,
            percent: if total == 0.0 { 0.0 } else { g.weight / total * 100.0 },
            color: g.color.clone(),
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));
    rows
}
