// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Comparison datasets: memoized trees and diffs against the primary.

mod cache;
mod diff;

pub use cache::{CacheKey, ComparisonCache, ComparisonCacheStats, ComparisonEntry};
pub use diff::{
    delta, diff, stacked_view, DiffError, DiffReport, DiffRow, DiffTable, StackedBar,
    StackedSegment, StackedView, DEFAULT_SEGMENT_COLOUR,
};
