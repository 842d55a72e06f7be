//! Comparison datasets: loading, ownership checks, diff and stacked views.
//!
//! Loads run concurrently and may finish in any order. Each finished load
//! is attached to the active set only if its dataset is still active under
//! the same context it was started in; otherwise the result is discarded.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::comparison::{
    diff, stacked_view, CacheKey, ComparisonCache, ComparisonCacheStats, ComparisonEntry,
    DiffReport, StackedView,
};
use crate::config::AggregationContext;
use crate::dataset::Dataset;
use crate::metrics;
use crate::rules::CompiledRules;
use crate::source::traits::DatasetSource;
use crate::tree::TreeAggregator;

use super::{ActiveComparison, EngineError, GroupingEngine};

/// Everything needed to build one comparison entry off the engine.
#[derive(Clone)]
struct ComparisonLoader {
    source: Arc<dyn DatasetSource>,
    raw_datasets: Arc<DashMap<String, Arc<Dataset>>>,
    cache: Arc<ComparisonCache>,
    rules: Arc<CompiledRules>,
    ctx: AggregationContext,
}

impl ComparisonLoader {
    /// Cached entry for the current context, or a fresh independent build.
    async fn load(&self, name: &str) -> Result<Arc<ComparisonEntry>, EngineError> {
        let key = CacheKey::new(name, &self.ctx);
        if let Some(entry) = self.cache.get(&key) {
            metrics::record_comparison_load("cached");
            return Ok(entry);
        }

        let memo = self.raw_datasets.get(name).map(|d| Arc::clone(d.value()));
        let dataset = match memo {
            Some(dataset) => dataset,
            None => {
                let dataset = Arc::new(self.source.fetch(name).await?);
                self.raw_datasets.insert(name.to_string(), Arc::clone(&dataset));
                dataset
            }
        };

        let (tree, report) = TreeAggregator::new(&self.rules, &self.ctx).build(&dataset);
        debug!(
            dataset = name,
            classified = report.classified,
            unassigned = report.unassigned.len(),
            "Comparison tree built"
        );
        let entry = self.cache.insert(key, ComparisonEntry::from_tree(name, tree));
        metrics::record_comparison_load("loaded");
        Ok(entry)
    }
}

impl GroupingEngine {
    fn comparison_loader(&self) -> Result<ComparisonLoader, EngineError> {
        // Rules and the version stamped into the cache key come from one read
        let rules = self.rules.read().clone();
        let ctx = self.context_for(rules.version);
        match (rules.compiled, ctx) {
            (Some(rules), Some(ctx)) => Ok(ComparisonLoader {
                source: Arc::clone(&self.source),
                raw_datasets: Arc::clone(&self.raw_datasets),
                cache: Arc::clone(&self.cache),
                rules,
                // Comparisons carry neither colours nor the noise filter
                ctx: AggregationContext::new(ctx.resource)
                    .with_labels_visible(ctx.labels_visible)
                    .with_rule_set_version(ctx.rule_set_version),
            }),
            (rules, ctx) => {
                let mut missing = Vec::new();
                if rules.is_none() {
                    missing.push("rules");
                }
                if ctx.is_none() {
                    missing.push("resource");
                }
                Err(EngineError::NotReady(missing))
            }
        }
    }

    /// Cached comparison entry for `name` under the current context, building
    /// and caching it on a miss. Does not touch the active set.
    #[tracing::instrument(skip(self))]
    pub async fn load_comparison(&self, name: &str) -> Result<Arc<ComparisonEntry>, EngineError> {
        let loader = self.comparison_loader()?;
        loader.load(name).await
    }

    /// Add `name` to the active comparison set (if absent) and return its
    /// current generation.
    fn register_comparison(&self, name: &str) -> u64 {
        let mut active = self.active.write();
        if !active.iter().any(|c| c.name == name) {
            active.push(ActiveComparison {
                name: name.to_string(),
                entry: None,
            });
            metrics::set_active_comparisons(active.len());
        }
        self.generation.load(Ordering::Acquire)
    }

    /// Attach a finished load, or discard it if its slot is gone.
    fn settle(
        &self,
        name: &str,
        generation: u64,
        result: Result<Arc<ComparisonEntry>, EngineError>,
    ) -> Result<Arc<ComparisonEntry>, EngineError> {
        let mut active = self.active.write();
        let current = self.generation.load(Ordering::Acquire) == generation;
        let slot = active.iter().position(|c| c.name == name).filter(|_| current);

        match (slot, result) {
            (Some(i), Ok(entry)) => {
                active[i].entry = Some(Arc::clone(&entry));
                info!(dataset = name, total = entry.total, "Comparison attached");
                Ok(entry)
            }
            (None, Ok(_)) => {
                metrics::record_comparison_load("discarded");
                debug!(dataset = name, "Comparison no longer active, result discarded");
                Err(EngineError::Superseded(name.to_string()))
            }
            (slot, Err(e)) => {
                metrics::record_comparison_load("failed");
                metrics::record_error("load_comparison", e.kind());
                warn!(dataset = name, error = %e, "Failed to load comparison dataset");
                if let Some(i) = slot {
                    active.remove(i);
                    metrics::set_active_comparisons(active.len());
                }
                Err(e)
            }
        }
    }

    /// Loader for datasets registered just before; unregisters them if the
    /// engine is not ready.
    ///
    /// Inputs are written before the generation is bumped, so a loader taken
    /// after registration that saw replaced inputs always settles against a
    /// newer generation and is discarded.
    fn loader_for_registered(&self, names: &[String]) -> Result<ComparisonLoader, EngineError> {
        self.comparison_loader().map_err(|e| {
            for name in names {
                self.remove_comparison(name);
            }
            e
        })
    }

    /// Add a dataset to the comparison set and load it.
    ///
    /// A load that finishes after the dataset was removed, or after an input
    /// change cleared the set, fails with [`EngineError::Superseded`]. A
    /// failed load removes the dataset from the set again.
    #[tracing::instrument(skip(self))]
    pub async fn add_comparison(&self, name: &str) -> Result<Arc<ComparisonEntry>, EngineError> {
        let generation = self.register_comparison(name);
        let loader = self.loader_for_registered(&[name.to_string()])?;
        let result = loader.load(name).await;
        self.settle(name, generation, result)
    }

    /// Add several datasets and load them concurrently.
    ///
    /// Results are returned in completion order.
    #[tracing::instrument(skip(self, names))]
    pub async fn add_comparisons<I, S>(
        &self,
        names: I,
    ) -> Result<Vec<(String, Result<Arc<ComparisonEntry>, EngineError>)>, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registered: Vec<(String, u64)> = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let generation = self.register_comparison(&name);
                (name, generation)
            })
            .collect();
        let names: Vec<String> = registered.iter().map(|(n, _)| n.clone()).collect();
        let loader = self.loader_for_registered(&names)?;

        let mut join_set: JoinSet<(String, u64, Result<Arc<ComparisonEntry>, EngineError>)> =
            JoinSet::new();
        for (name, generation) in registered {
            let loader = loader.clone();
            join_set.spawn(async move {
                let result = loader.load(&name).await;
                (name, generation, result)
            });
        }

        let mut settled = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, generation, result)) => {
                    let result = self.settle(&name, generation, result);
                    settled.push((name, result));
                }
                Err(e) => warn!(error = %e, "Comparison load task failed"),
            }
        }
        Ok(settled)
    }

    /// Remove a dataset from the comparison set. An in-flight load for it
    /// will be discarded on arrival.
    pub fn remove_comparison(&self, name: &str) -> bool {
        let mut active = self.active.write();
        let before = active.len();
        active.retain(|c| c.name != name);
        metrics::set_active_comparisons(active.len());
        active.len() != before
    }

    pub fn clear_comparisons(&self) {
        let mut active = self.active.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        active.clear();
        metrics::set_active_comparisons(0);
    }

    /// Names in the active comparison set, loaded or not, in insertion order.
    #[must_use]
    pub fn active_comparisons(&self) -> Vec<String> {
        self.active.read().iter().map(|c| c.name.clone()).collect()
    }

    /// Loaded comparison entries, in insertion order.
    #[must_use]
    pub fn comparisons(&self) -> Vec<Arc<ComparisonEntry>> {
        self.active
            .read()
            .iter()
            .filter_map(|c| c.entry.clone())
            .collect()
    }

    /// Diff of the primary tree against every loaded comparison.
    #[tracing::instrument(skip(self))]
    pub fn diff(&self, focus: Option<&str>, relative: bool) -> Result<DiffReport, EngineError> {
        let _timer = metrics::LatencyTimer::new("diff");
        let tree = self
            .primary_tree()
            .ok_or(EngineError::NotReady(vec!["primary tree"]))?;
        let limit = self.config.read().drill_down_limit;

        let report = diff(&tree, &self.comparisons(), focus, relative, limit)?;
        metrics::record_diff(focus.is_some(), relative);
        Ok(report)
    }

    /// Stacked view of the primary and every loaded comparison.
    pub fn stacked(&self) -> Result<StackedView, EngineError> {
        let _timer = crate::time_operation!("stacked");
        let tree = self
            .primary_tree()
            .ok_or(EngineError::NotReady(vec!["primary tree"]))?;
        let name = self.primary_name().unwrap_or_default();
        let priority = self.config.read().stack_priority.clone();
        Ok(stacked_view(&name, &tree, &self.comparisons(), &priority))
    }

    pub fn cache_stats(&self) -> ComparisonCacheStats {
        let stats = self.cache.stats();
        metrics::set_comparison_cache_stats(stats.entry_count, stats.hit_rate);
        stats
    }
}
