//! Primary tree lifecycle: rebuild, render handshake, config updates.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AggregationContext, GroupingConfig};
use crate::metrics;
use crate::rules::CompiledRules;
use crate::tree::{
    assign_colours, summarize, AggregationReport, GroupTree, SummaryRow, TreeAggregator,
};

use super::{EngineError, EngineState, GroupingEngine, PrimaryDataset};

/// Inputs of one primary build, read after `epoch` was sampled.
struct PrimaryInputs {
    epoch: u64,
    primary: PrimaryDataset,
    rules: Arc<CompiledRules>,
    ctx: AggregationContext,
}

impl GroupingEngine {
    /// Everything a primary build needs, or the list of what is missing.
    fn primary_inputs(&self) -> Result<PrimaryInputs, EngineError> {
        let epoch = self.input_epoch.load(Ordering::Acquire);
        let primary = self.primary.read().clone();
        let rules = self.rules.read().clone();
        let has_colours = self.colours.read().is_some();
        let ctx = self.context_for(rules.version);

        match (primary, rules.compiled, ctx) {
            (Some(primary), Some(rules), Some(ctx)) if has_colours => Ok(PrimaryInputs {
                epoch,
                primary,
                rules,
                ctx,
            }),
            (primary, rules, ctx) => {
                let mut missing = Vec::new();
                if primary.is_none() {
                    missing.push("dataset");
                }
                if rules.is_none() {
                    missing.push("rules");
                }
                if !has_colours {
                    missing.push("colours");
                }
                if ctx.is_none() {
                    missing.push("resource");
                }
                Err(EngineError::NotReady(missing))
            }
        }
    }

    /// Rebuild the primary tree from scratch.
    ///
    /// Fails with [`EngineError::Processing`] while the previous tree has not
    /// been acknowledged by [`render_complete()`](Self::render_complete), and
    /// with [`EngineError::NotReady`] naming any missing input. If an input
    /// changes while the tree is being built, the tree is dropped and the
    /// call fails with [`EngineError::Superseded`].
    #[tracing::instrument(skip(self))]
    pub fn rebuild(&self) -> Result<Arc<GroupTree>, EngineError> {
        if self.processing.load(Ordering::Acquire) {
            metrics::record_error("rebuild", EngineError::Processing.kind());
            return Err(EngineError::Processing);
        }

        let inputs = match self.primary_inputs() {
            Ok(inputs) => inputs,
            Err(e) => {
                debug!(error = %e, "Primary tree not buildable yet");
                metrics::record_error("rebuild", e.kind());
                self.set_state(EngineState::Waiting);
                return Err(e);
            }
        };

        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::Processing);
        }

        let _timer = metrics::LatencyTimer::new("rebuild");
        self.set_state(EngineState::Aggregating);

        let PrimaryInputs {
            epoch,
            primary,
            rules,
            ctx,
        } = inputs;
        let (mut tree, report) = TreeAggregator::new(&rules, &ctx).build(&primary.dataset);
        if let Some(colours) = ctx.colours.as_deref() {
            let coloured = assign_colours(&mut tree.root, colours);
            debug!(coloured, "Colours applied");
        }
        tree.assign_ids();

        let nodes = tree.root.node_count();
        metrics::set_primary_tree_nodes(nodes);
        info!(
            dataset = %primary.name,
            resource = %ctx.resource,
            version = ctx.rule_set_version,
            nodes,
            unassigned = report.unassigned.len(),
            "Primary tree rebuilt"
        );

        self.publish(tree, report, epoch, &primary.name)
    }

    /// Install a freshly built tree, unless an input changed since `epoch`
    /// was sampled.
    pub(super) fn publish(
        &self,
        tree: GroupTree,
        report: AggregationReport,
        epoch: u64,
        dataset: &str,
    ) -> Result<Arc<GroupTree>, EngineError> {
        let mut slot = self.primary_tree.write();
        if self.input_epoch.load(Ordering::Acquire) != epoch {
            self.set_state(EngineState::Waiting);
            drop(slot);
            // No render will follow this build
            self.processing.store(false, Ordering::Release);
            metrics::record_error("rebuild", "superseded");
            warn!(dataset, "Inputs changed during rebuild, tree discarded");
            return Err(EngineError::Superseded(dataset.to_string()));
        }

        let tree = Arc::new(tree);
        *slot = Some(Arc::clone(&tree));
        *self.last_report.write() = Some(report);
        self.set_state(EngineState::Ready);
        Ok(tree)
    }

    /// Signal that the last primary tree has been rendered.
    pub fn render_complete(&self) {
        self.processing.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Top-level summary rows of the primary tree.
    pub fn summary(&self) -> Result<Vec<SummaryRow>, EngineError> {
        let tree = self
            .primary_tree()
            .ok_or(EngineError::NotReady(vec!["primary tree"]))?;
        Ok(summarize(&tree))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIG - Runtime updates via watch channel
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply the latest config from the watch channel, if it changed.
    ///
    /// Returns `true` if a new config was applied.
    pub async fn apply_config_updates(&self) -> bool {
        let new_config = {
            let mut rx = self.config_rx.lock().await;
            match rx.has_changed() {
                Ok(true) => {}
                _ => return false,
            }
            let config = rx.borrow_and_update().clone();
            config
        };
        self.apply_config(new_config);
        true
    }

    /// Follow config updates until the sender is dropped.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) {
        info!("Grouping engine watching for config updates");
        loop {
            let new_config = {
                let mut rx = self.config_rx.lock().await;
                if rx.changed().await.is_err() {
                    break;
                }
                let config = rx.borrow_and_update().clone();
                config
            };
            self.apply_config(new_config);
        }
        info!("Config channel closed");
    }

    fn apply_config(&self, new_config: GroupingConfig) {
        let old = {
            let mut config = self.config.write();
            std::mem::replace(&mut *config, new_config.clone())
        };

        if old.comparison_cache_max_entries != new_config.comparison_cache_max_entries {
            warn!(
                old = old.comparison_cache_max_entries,
                new = new_config.comparison_cache_max_entries,
                "Comparison cache bound is fixed at construction"
            );
        }

        let invalidates = old.resource != new_config.resource
            || old.show_labels != new_config.show_labels
            || old.threshold != new_config.threshold;
        info!(
            resource = ?new_config.resource,
            show_labels = new_config.show_labels,
            invalidates,
            "Config updated"
        );
        if invalidates {
            self.invalidate("config");
        }
    }
}
