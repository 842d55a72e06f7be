// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Comparison Cache
//!
//! Memoizes independently aggregated comparison trees.
//!
//! # Invalidation
//!
//! - The key carries the rule-set version, resource and label flag
//! - Recompiling rules bumps the version → old entries are never looked up
//! - Entries for other labels/resource variants stay, so switching back hits
//! - Bounded by max entries with oldest-eviction
//!
//! # Flow
//!
//! ```text
//! load_comparison(name)
//!       │
//!       ▼
//! ┌─────────────────────────────────────┐
//! │  Cache lookup                       │
//! │  key = (name, resource,             │
//! │         rule_set_version, labels)   │
//! └─────────────────────────────────────┘
//!       │
//!       ├─→ Hit → return the same Arc<ComparisonEntry>
//!       │
//!       └─→ Miss → fetch + aggregate, insert once
//! ```

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::AggregationContext;
use crate::metrics;
use crate::tree::GroupTree;

/// Composite identity of a memoized comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub dataset: String,
    pub resource: String,
    pub rule_set_version: u64,
    pub labels_visible: bool,
}

impl CacheKey {
    pub fn new(dataset: impl Into<String>, ctx: &AggregationContext) -> Self {
        Self {
            dataset: dataset.into(),
            resource: ctx.resource.clone(),
            rule_set_version: ctx.rule_set_version,
            labels_visible: ctx.labels_visible,
        }
    }
}

/// A comparison dataset aggregated on its own tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub name: String,
    /// Top-level group label -> normalized weight
    pub top_level_weights: BTreeMap<String, f64>,
    /// Sum of the top-level group weights
    pub total: f64,
    /// Full tree, kept for drill-down
    #[serde(skip)]
    pub tree: GroupTree,
}

impl ComparisonEntry {
    pub fn from_tree(name: impl Into<String>, tree: GroupTree) -> Self {
        let top_level_weights = tree.top_level_weights();
        Self {
            name: name.into(),
            total: top_level_weights.values().sum(),
            top_level_weights,
            tree,
        }
    }
}

/// Memoized comparison trees keyed by [`CacheKey`]
pub struct ComparisonCache {
    /// Key → entry, each written once and never mutated
    cache: DashMap<CacheKey, Arc<ComparisonEntry>>,
    /// Insertion order for eviction (oldest first)
    order: Mutex<VecDeque<CacheKey>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Lookups that found the dataset cached under an outdated context
    stale: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl ComparisonCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale: AtomicU64::new(0),
        }
    }

    /// Cached entry for `key`, if any.
    ///
    /// A miss for a dataset that is cached under another context counts as
    /// stale. Nothing is removed here; eviction only happens on insert.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ComparisonEntry>> {
        if let Some(entry) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_comparison_cache("hit");
            return Some(Arc::clone(entry.value()));
        }

        if self.cache.iter().any(|e| e.key().dataset == key.dataset) {
            self.stale.fetch_add(1, Ordering::Relaxed);
            metrics::record_comparison_cache("stale");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_comparison_cache("miss");
        None
    }

    /// Store an entry, returning the one that ends up cached.
    ///
    /// The first writer for a key wins; a later insert for the same key
    /// gets the existing entry back, so callers always share one object.
    pub fn insert(&self, key: CacheKey, entry: ComparisonEntry) -> Arc<ComparisonEntry> {
        if let Some(existing) = self.cache.get(&key) {
            return Arc::clone(existing.value());
        }

        let mut order = self.order.lock();
        while self.cache.len() >= self.max_entries {
            match order.pop_front() {
                Some(old_key) => {
                    self.cache.remove(&old_key);
                }
                None => break,
            }
        }

        let entry = Arc::clone(
            self.cache
                .entry(key.clone())
                .or_insert_with(|| Arc::new(entry))
                .value(),
        );
        if !order.contains(&key) {
            order.push_back(key);
        }
        entry
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn stats(&self) -> ComparisonCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        ComparisonCacheStats {
            hits,
            misses,
            stale: self.stale.load(Ordering::Relaxed),
            entry_count: self.cache.len(),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.cache.clear();
        order.clear();
    }
}

impl Default for ComparisonCache {
    fn default() -> Self {
        Self::new(256)
    }
}
