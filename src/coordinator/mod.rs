// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Grouping engine coordinator.
//!
//! The [`GroupingEngine`] ties the pipeline together:
//! - dataset source for the primary and comparison datasets
//! - compiled rules with a version counter
//! - colour scheme and the primary tree
//! - comparison cache and the active comparison set
//!
//! # Lifecycle
//!
//! ```text
//! Created → Waiting → Aggregating → Ready
//!              ▲                      │
//!              └──── input change ────┘
//! ```
//!
//! Any change of dataset, resource, rules, colours or label visibility drops
//! the primary tree and clears the active comparison set. Cached comparison
//! trees stay; their keys simply stop matching.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use grouping_engine::{GroupingEngine, GroupingConfig, EngineState, InMemorySource};
//! use tokio::sync::watch;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = GroupingConfig::default();
//! let (_tx, rx) = watch::channel(config.clone());
//! let engine = GroupingEngine::new(config, rx, Arc::new(InMemorySource::new()));
//!
//! assert_eq!(engine.state(), EngineState::Created);
//! # }
//! ```

mod comparison_api;
mod lifecycle;
mod types;

pub use types::{EngineError, EngineState};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::comparison::{ComparisonCache, ComparisonEntry};
use crate::config::{AggregationContext, GroupingConfig};
use crate::dataset::Dataset;
use crate::rules::{CompiledRules, RuleSet};
use crate::source::traits::DatasetSource;
use crate::tree::{AggregationReport, ColourScheme, GroupTree};

/// The dataset currently shown as primary.
#[derive(Debug, Clone)]
pub(super) struct PrimaryDataset {
    pub(super) name: String,
    pub(super) dataset: Arc<Dataset>,
}

/// Compiled rules and the version they were compiled as.
///
/// Both live behind one lock so a reader never pairs new rules with an old
/// version (or the reverse).
#[derive(Debug, Clone, Default)]
pub(super) struct RuleState {
    pub(super) compiled: Option<Arc<CompiledRules>>,
    pub(super) version: u64,
}

/// A dataset in the active comparison set; `entry` is `None` while loading.
#[derive(Debug, Clone)]
pub(super) struct ActiveComparison {
    pub(super) name: String,
    pub(super) entry: Option<Arc<ComparisonEntry>>,
}

/// Main grouping engine.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Each input sits behind its own lock and
/// every input change bumps `input_epoch` while holding the primary-tree
/// lock. Builds sample the epoch before reading inputs and publish only if
/// it is unchanged, so a tree built from replaced inputs is dropped. Comparison entries are immutable once built and shared by `Arc`.
pub struct GroupingEngine {
    /// Configuration (can be updated at runtime via watch channel)
    pub(super) config: RwLock<GroupingConfig>,

    /// Runtime config updates
    pub(super) config_rx: Mutex<watch::Receiver<GroupingConfig>>,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    pub(super) state_rx: watch::Receiver<EngineState>,

    /// Where datasets come from
    pub(super) source: Arc<dyn DatasetSource>,

    /// Raw datasets already fetched, by name
    pub(super) raw_datasets: Arc<DashMap<String, Arc<Dataset>>>,

    pub(super) primary: RwLock<Option<PrimaryDataset>>,

    /// Current compiled rules, version bumped on every recompilation
    pub(super) rules: RwLock<RuleState>,

    pub(super) colours: RwLock<Option<Arc<ColourScheme>>>,

    /// Last built primary tree, dropped on any input change
    pub(super) primary_tree: RwLock<Option<Arc<GroupTree>>>,

    /// Diagnostics of the last primary build
    pub(super) last_report: RwLock<Option<AggregationReport>>,

    /// Set when a primary build starts, cleared by `render_complete()`
    pub(super) processing: AtomicBool,

    /// Comparison trees keyed by dataset and aggregation context
    pub(super) cache: Arc<ComparisonCache>,

    /// Active comparison set, in the order datasets were added
    pub(super) active: RwLock<Vec<ActiveComparison>>,

    /// Bumped whenever the active set is cleared
    pub(super) generation: AtomicU64,

    /// Bumped on every input change, under the primary-tree lock
    pub(super) input_epoch: AtomicU64,
}

impl GroupingEngine {
    /// Create a new grouping engine.
    ///
    /// The engine starts in `Created` state. Supply a primary dataset, rules,
    /// colours and a resource, then call [`rebuild()`](Self::rebuild).
    pub fn new(
        config: GroupingConfig,
        config_rx: watch::Receiver<GroupingConfig>,
        source: Arc<dyn DatasetSource>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let cache = Arc::new(ComparisonCache::new(config.comparison_cache_max_entries));

        Self {
            config: RwLock::new(config),
            config_rx: Mutex::new(config_rx),
            state: state_tx,
            state_rx,
            source,
            raw_datasets: Arc::new(DashMap::new()),
            primary: RwLock::new(None),
            rules: RwLock::new(RuleState::default()),
            colours: RwLock::new(None),
            primary_tree: RwLock::new(None),
            last_report: RwLock::new(None),
            processing: AtomicBool::new(false),
            cache,
            active: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            input_epoch: AtomicU64::new(0),
        }
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Check if the primary tree is current.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), EngineState::Ready)
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> GroupingConfig {
        self.config.read().clone()
    }

    #[must_use]
    pub fn rule_set_version(&self) -> u64 {
        self.rules.read().version
    }

    /// Name of the primary dataset, if one is set.
    #[must_use]
    pub fn primary_name(&self) -> Option<String> {
        self.primary.read().as_ref().map(|p| p.name.clone())
    }

    /// The current primary tree, `None` until the next successful rebuild.
    #[must_use]
    pub fn primary_tree(&self) -> Option<Arc<GroupTree>> {
        self.primary_tree.read().clone()
    }

    /// Diagnostics of the last primary build.
    #[must_use]
    pub fn last_report(&self) -> Option<AggregationReport> {
        self.last_report.read().clone()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INPUTS - every change invalidates the primary tree and comparisons
    // ═══════════════════════════════════════════════════════════════════════════

    /// Fetch a dataset from the source and make it the primary.
    #[tracing::instrument(skip(self))]
    pub async fn load_primary(&self, name: &str) -> Result<(), EngineError> {
        let dataset = self.source.fetch(name).await?;
        self.set_primary_dataset(name, dataset);
        Ok(())
    }

    pub fn set_primary_dataset(&self, name: impl Into<String>, dataset: Dataset) {
        let name = name.into();
        let dataset = Arc::new(dataset);
        self.raw_datasets.insert(name.clone(), Arc::clone(&dataset));
        info!(dataset = %name, modules = dataset.modules.len(), "Primary dataset set");
        *self.primary.write() = Some(PrimaryDataset { name, dataset });
        self.invalidate("dataset");
    }

    /// Compile and install a rule set, returning the new rule-set version.
    ///
    /// With `strict_patterns` configured, an invalid glob rejects the whole
    /// set and the previous rules stay in place.
    pub fn set_rules(&self, rule_set: &RuleSet) -> Result<u64, EngineError> {
        let compiled = if self.config.read().strict_patterns {
            CompiledRules::compile_strict(rule_set)?
        } else {
            CompiledRules::compile(rule_set)
        };
        let rule_count = compiled.len();
        let version = {
            let mut rules = self.rules.write();
            rules.version += 1;
            rules.compiled = Some(Arc::new(compiled));
            rules.version
        };

        crate::metrics::record_rules_compiled(rule_count, version);
        info!(version, rules = rule_count, "Rule set compiled");
        self.invalidate("rules");
        Ok(version)
    }

    pub fn set_colours(&self, colours: ColourScheme) {
        debug!(entries = colours.len(), "Colour scheme set");
        *self.colours.write() = Some(Arc::new(colours));
        self.invalidate("colours");
    }

    pub fn set_resource(&self, resource: impl Into<String>) {
        let resource = resource.into();
        {
            let mut config = self.config.write();
            if config.resource.as_deref() == Some(resource.as_str()) {
                return;
            }
            config.resource = Some(resource);
        }
        self.invalidate("resource");
    }

    pub fn set_labels_visible(&self, visible: bool) {
        {
            let mut config = self.config.write();
            if config.show_labels == visible {
                return;
            }
            config.show_labels = visible;
        }
        self.invalidate("labels");
    }

    /// Aggregation context for the current inputs, `None` without a resource.
    #[must_use]
    pub fn context(&self) -> Option<AggregationContext> {
        self.context_for(self.rule_set_version())
    }

    /// Context stamped with `version`, taken from the same [`RuleState`]
    /// snapshot as the rules it will be built with.
    pub(super) fn context_for(&self, version: u64) -> Option<AggregationContext> {
        let config = self.config.read();
        let resource = config.resource.clone()?;
        let mut ctx = AggregationContext::new(resource)
            .with_labels_visible(config.show_labels)
            .with_rule_set_version(version)
            .with_threshold(config.threshold);
        if let Some(colours) = self.colours.read().as_ref() {
            ctx = ctx.with_colours(Arc::clone(colours));
        }
        Some(ctx)
    }

    pub(super) fn set_state(&self, state: EngineState) {
        let _ = self.state.send(state);
        crate::metrics::set_engine_state(&state.to_string());
    }

    /// Drop the primary tree and the active comparison set.
    ///
    /// Lock order is primary tree, then active set. A rebuild publishing
    /// under the primary-tree lock either lands before this (and is cleared)
    /// or sees the new epoch (and is dropped).
    pub(super) fn invalidate(&self, reason: &'static str) {
        let mut tree = self.primary_tree.write();
        let mut active = self.active.write();
        self.input_epoch.fetch_add(1, Ordering::AcqRel);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *tree = None;
        let cleared = active.len();
        active.clear();
        self.set_state(EngineState::Waiting);
        drop(active);
        drop(tree);

        crate::metrics::set_active_comparisons(0);
        debug!(reason, cleared_comparisons = cleared, "Inputs changed");
    }
}
