// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tree aggregation and normalization.
//!
//! ```text
//! record (EDProducer, hltPixelTracks, 12.0)
//! path   [Tracking, Pixels, EDProducer]
//!
//! root ─────────────────────── +12.0
//! └── Tracking ─────────────── +12.0
//!     └── Pixels ───────────── +12.0
//!         └── EDProducer ───── +12.0
//!             └── hltPixelTracks  12.0 (leaf)
//! ```
//!
//! Every node on the path accumulates the full record weight. The tree is
//! then divided once by the total event count to express per-event cost.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::AggregationContext;
use crate::dataset::{Dataset, Record};
use crate::metrics;
use crate::rules::{CompiledRules, GroupClassifier, UnassignedRecord, OTHER};

use super::group_node::{GroupNode, GroupTree};

/// What happened to the records of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationReport {
    /// Records folded into the tree
    pub classified: usize,
    /// Records without a value for the active resource
    pub skipped_missing_resource: usize,
    /// Records at or below the noise threshold
    pub skipped_below_threshold: usize,
    /// Records no rule accepted, aggregated under `Unassigned`
    pub unassigned: Vec<UnassignedRecord>,
}

/// Fold one classified record into the tree.
///
/// Walks `path` from `root`, finding or creating a child group per segment
/// and adding the record's value to every node traversed, then appends a
/// leaf for the record under the last segment. Child lookup is by label
/// among groups, in insertion order.
///
/// Returns `false`, leaving the tree untouched, if the record has no value
/// for `resource`.
pub fn aggregate(
    root: &mut GroupNode,
    path: &[String],
    record: &Record,
    resource: &str,
    labels_visible: bool,
) -> bool {
    let Some(weight) = record.resource(resource) else {
        return false;
    };

    let mut node = root;
    for segment in path {
        node.weight += weight;
        let idx = match node
            .children
            .iter()
            .position(|c| c.is_group() && c.label == *segment)
        {
            Some(idx) => idx,
            None => {
                node.children.push(GroupNode::group(segment.clone()));
                node.children.len() - 1
            }
        };
        node = &mut node.children[idx];
    }

    let label = if labels_visible || record.label == OTHER {
        record.label.clone()
    } else {
        String::new()
    };
    let mut leaf = GroupNode::leaf(label, weight);
    leaf.events = record.event_count;
    leaf.ratio = record.ratio;
    node.children.push(leaf);
    node.weight += weight;

    true
}

/// Divide every weight (and event count) in the subtree by `total_events`.
///
/// Mutates in place and is not idempotent: a second call divides again.
/// Call exactly once per freshly aggregated tree. A zero divisor yields
/// non-finite weights, which are left for the caller to handle.
pub fn normalize(node: &mut GroupNode, total_events: f64) {
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        node.weight /= total_events;
        if let Some(events) = node.events.as_mut() {
            *events /= total_events;
        }
        stack.extend(node.children.iter_mut());
    }
}

/// Builds a normalized [`GroupTree`] from a dataset.
///
/// Each build produces a fresh, independent tree; nothing is shared between
/// builds.
#[derive(Debug, Clone, Copy)]
pub struct TreeAggregator<'a> {
    rules: &'a CompiledRules,
    ctx: &'a AggregationContext,
}

impl<'a> TreeAggregator<'a> {
    pub fn new(rules: &'a CompiledRules, ctx: &'a AggregationContext) -> Self {
        Self { rules, ctx }
    }

    /// Classify, aggregate and normalize every record of `dataset`.
    #[instrument(skip_all, fields(dataset = %dataset.total.label, resource = %self.ctx.resource))]
    pub fn build(&self, dataset: &Dataset) -> (GroupTree, AggregationReport) {
        let _timer = metrics::LatencyTimer::new("aggregate");
        let resource = self.ctx.resource.as_str();
        let classifier = GroupClassifier::new(self.rules);
        let threshold = self.ctx.threshold.map(|t| t * dataset.total.events);

        let mut tree = GroupTree::new(
            dataset.total.label.clone(),
            dataset.total.resource(resource),
        );
        tree.root.ratio = dataset.total.ratio;

        let mut report = AggregationReport::default();

        for record in &dataset.modules {
            let Some(value) = record.resource(resource) else {
                debug!(kind = %record.kind, label = %record.label, "Record has no value for the active resource");
                report.skipped_missing_resource += 1;
                continue;
            };
            if threshold.is_some_and(|t| value <= t) {
                report.skipped_below_threshold += 1;
                continue;
            }

            let classification = classifier.classify(record);
            if !classification.assigned {
                report.unassigned.push(UnassignedRecord {
                    kind: record.kind.clone(),
                    label: record.label.clone(),
                });
            }

            aggregate(
                &mut tree.root,
                &classification.path,
                record,
                resource,
                self.ctx.labels_visible,
            );
            report.classified += 1;
        }

        normalize(&mut tree.root, dataset.total.events);

        if !report.unassigned.is_empty() {
            warn!(count = report.unassigned.len(), "Records left unassigned");
        }
        metrics::record_aggregation(&report);

        (tree, report)
    }
}
