// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the grouping engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `grouping_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: aggregate, rebuild, load_comparison, diff
//! - `outcome`: hit, miss, stale / loaded, cached, discarded, failed

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::tree::AggregationReport;

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "grouping_engine_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// AGGREGATION - Record accounting per tree build
// ═══════════════════════════════════════════════════════════════════════════

/// Record the outcome of one tree build
pub fn record_aggregation(report: &AggregationReport) {
    counter!("grouping_engine_records_classified_total").increment(report.classified as u64);
    counter!(
        "grouping_engine_records_skipped_total",
        "reason" => "missing_resource"
    )
    .increment(report.skipped_missing_resource as u64);
    counter!(
        "grouping_engine_records_skipped_total",
        "reason" => "below_threshold"
    )
    .increment(report.skipped_below_threshold as u64);
    counter!("grouping_engine_records_unassigned_total").increment(report.unassigned.len() as u64);
}

/// Record a rule-set recompilation
pub fn record_rules_compiled(rule_count: usize, version: u64) {
    counter!("grouping_engine_rule_compilations_total").increment(1);
    gauge!("grouping_engine_rule_count").set(rule_count as f64);
    gauge!("grouping_engine_rule_set_version").set(version as f64);
}

/// Set node count of the current primary tree
pub fn set_primary_tree_nodes(count: usize) {
    gauge!("grouping_engine_primary_tree_nodes").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// COMPARISONS - Cache and load outcomes
// ═══════════════════════════════════════════════════════════════════════════

/// Record comparison cache lookup (hit, miss, stale)
pub fn record_comparison_cache(outcome: &'static str) {
    counter!(
        "grouping_engine_comparison_cache_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Set comparison cache stats gauge
pub fn set_comparison_cache_stats(entries: usize, hit_rate: f64) {
    gauge!("grouping_engine_comparison_cache_entries").set(entries as f64);
    gauge!("grouping_engine_comparison_cache_hit_rate").set(hit_rate);
}

/// Record comparison load outcome (loaded, cached, discarded, failed)
pub fn record_comparison_load(outcome: &'static str) {
    counter!(
        "grouping_engine_comparison_loads_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Set number of datasets in the active comparison set
pub fn set_active_comparisons(count: usize) {
    gauge!("grouping_engine_active_comparisons").set(count as f64);
}

/// Record a diff computation
pub fn record_diff(focused: bool, relative: bool) {
    counter!(
        "grouping_engine_diffs_total",
        "focused" => if focused { "true" } else { "false" },
        "relative" => if relative { "true" } else { "false" }
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE - State machine and errors
// ═══════════════════════════════════════════════════════════════════════════

/// Set engine state (for monitoring state machine transitions)
pub fn set_engine_state(state: &str) {
    counter!(
        "grouping_engine_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// Record an error with category for alerting
pub fn record_error(operation: &str, error_type: &str) {
    counter!(
        "grouping_engine_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($op:expr) => {
        $crate::metrics::LatencyTimer::new($op)
    };
}
