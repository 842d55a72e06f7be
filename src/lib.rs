//! # Grouping Engine
//!
//! Groups flat per-module performance measurements into a weighted tree
//! according to user rules, and compares several measurement runs against
//! each other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Rule Layer                           │
//! │  • RuleSet keys "label" / "kind|label", literal or glob    │
//! │  • Compiled once per rule load, versioned                  │
//! │  • First match wins, implicit "other" catch-all            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                     (classify each record)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Tree Aggregation                        │
//! │  • Every node on the path accumulates the record value     │
//! │  • Normalized once by the dataset's event count            │
//! │  • Colours and ids attached by path                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (same pipeline, independent trees)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Comparisons                           │
//! │  • Cached per (dataset, resource, rule version, labels)    │
//! │  • Absolute / relative diff, optional drill-down           │
//! │  • Stacked per-dataset view                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use grouping_engine::{ColourScheme, GroupingConfig, GroupingEngine, InMemorySource, RuleSet};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = InMemorySource::new();
//!     source.insert_json("run1", br#"{
//!         "total": { "label": "HLT", "events": 10, "time_real": 30.0 },
//!         "resources": [ { "time_real": "real time" } ],
//!         "modules": [ { "type": "A", "label": "a1", "time_real": 30.0 } ]
//!     }"#).expect("valid dataset");
//!
//!     let config = GroupingConfig {
//!         resource: Some("time_real".into()),
//!         ..Default::default()
//!     };
//!     let (_tx, rx) = watch::channel(config.clone());
//!     let engine = GroupingEngine::new(config, rx, Arc::new(source));
//!
//!     engine.load_primary("run1").await.expect("dataset exists");
//!     engine.set_rules(&RuleSet::from_pairs([("A|", "Group1")])).expect("rules compile");
//!     engine.set_colours(ColourScheme::new());
//!
//!     let tree = engine.rebuild().expect("inputs complete");
//!     println!("{}", serde_json::to_string_pretty(&*tree).unwrap());
//!     engine.render_complete();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`GroupingEngine`] orchestrating all components
//! - [`rules`]: Pattern compilation and record classification
//! - [`tree`]: Aggregation, normalization, colours, summaries
//! - [`comparison`]: Comparison cache, diffs, stacked view
//! - [`source`]: Where datasets come from
//! - [`dataset`]: Measurement dataset model

pub mod comparison;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod metrics;
pub mod rules;
pub mod source;
pub mod tree;

pub use comparison::{
    CacheKey, ComparisonCache, ComparisonCacheStats, ComparisonEntry, DiffError, DiffReport,
    DiffRow, DiffTable, StackedView,
};
pub use config::{AggregationContext, GroupingConfig};
pub use coordinator::{EngineError, EngineState, GroupingEngine};
pub use dataset::{Dataset, DatasetError, DatasetTotal, Record, ResourceInfo};
pub use metrics::LatencyTimer;
pub use rules::{CompiledRules, GroupClassifier, Matcher, RuleError, RuleSet};
pub use source::memory::InMemorySource;
pub use source::traits::{DatasetSource, SourceError};
pub use tree::{AggregationReport, ColourScheme, GroupNode, GroupTree, SummaryRow, TreeAggregator};
