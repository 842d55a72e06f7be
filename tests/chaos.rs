//! Chaos Testing for the Grouping Engine
//!
//! This module tests failure scenarios using:
//! 1. **FailingSource wrappers** - precise error injection at specific call counts
//! 2. **DelayedSource wrappers** - comparison loads finishing out of order
//! 3. **Input churn** - context changes while loads are in flight
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use grouping_engine::{
    ColourScheme, Dataset, DatasetSource, EngineError, EngineState, GroupingConfig,
    GroupingEngine, InMemorySource, Record, RuleSet, SourceError,
};

// =============================================================================
// Failing Source Wrappers - Precise Error Injection
// =============================================================================

/// A wrapper that injects failures at specific call counts.
pub struct FailingSource<S: DatasetSource> {
    inner: S,
    call_count: AtomicU64,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
    /// Error message to return
    error_msg: String,
    /// Whether to fail all calls after first failure
    fail_permanently: AtomicBool,
}

#[allow(dead_code)]
impl<S: DatasetSource> FailingSource<S> {
    pub fn new(inner: S, fail_on_calls: Vec<u64>, error_msg: &str) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls,
            error_msg: error_msg.to_string(),
            fail_permanently: AtomicBool::new(false),
        }
    }

    /// Create a source that fails permanently after N calls
    pub fn fail_after(inner: S, n: u64, error_msg: &str) -> Self {
        let store = Self::new(inner, vec![n + 1], error_msg);
        store.fail_permanently.store(true, Ordering::SeqCst);
        store
    }

    pub fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_permanently.load(Ordering::SeqCst) && !self.fail_on_calls.is_empty() {
            count >= self.fail_on_calls[0]
        } else {
            self.fail_on_calls.contains(&count)
        }
    }
}

#[async_trait]
impl<S: DatasetSource> DatasetSource for FailingSource<S> {
    async fn fetch(&self, name: &str) -> Result<Dataset, SourceError> {
        if self.should_fail() {
            return Err(SourceError::Backend(self.error_msg.clone()));
        }
        self.inner.fetch(name).await
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        self.inner.list().await
    }
}

/// A wrapper that delays each fetch by a per-dataset duration and records
/// the order in which fetches finished.
pub struct DelayedSource<S: DatasetSource> {
    inner: S,
    delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
}

impl<S: DatasetSource> DelayedSource<S> {
    pub fn new(inner: S, delays: &[(&str, u64)]) -> Self {
        Self {
            inner,
            delays: delays
                .iter()
                .map(|(name, ms)| (name.to_string(), Duration::from_millis(*ms)))
                .collect(),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl<S: DatasetSource> DatasetSource for DelayedSource<S> {
    async fn fetch(&self, name: &str) -> Result<Dataset, SourceError> {
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        let result = self.inner.fetch(name).await;
        self.completed.lock().push(name.to_string());
        result
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        self.inner.list().await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn run_json(label: &str, a: f64, b: f64) -> Vec<u8> {
    format!(
        r#"{{
        "total": {{ "label": "{label}", "events": 10, "time_real": 100.0 }},
        "resources": [ {{ "time_real": "real time" }} ],
        "modules": [
            {{ "type": "A", "label": "a1", "time_real": {a} }},
            {{ "type": "B", "label": "b1", "time_real": {b} }}
        ]
    }}"#
    )
    .into_bytes()
}

fn memory_source() -> InMemorySource {
    let source = InMemorySource::new();
    source.insert_json("run1", &run_json("run1", 10.0, 20.0)).unwrap();
    source.insert_json("run2", &run_json("run2", 20.0, 20.0)).unwrap();
    source.insert_json("run3", &run_json("run3", 5.0, 40.0)).unwrap();
    source.insert_json("run4", &run_json("run4", 1.0, 1.0)).unwrap();
    source
}

/// Engine with a primary tree over `source`; `run1` is seeded directly so
/// the source only sees comparison fetches.
fn engine_with(source: Arc<dyn DatasetSource>) -> GroupingEngine {
    let config = GroupingConfig {
        resource: Some("time_real".into()),
        ..Default::default()
    };
    let (_tx, rx) = watch::channel(config.clone());
    let engine = GroupingEngine::new(config, rx, source);

    let primary = Dataset::from_json(&run_json("run1", 10.0, 20.0)).unwrap();
    engine.set_primary_dataset("run1", primary);
    engine
        .set_rules(&RuleSet::from_pairs([("A|", "GroupA"), ("B|", "GroupB")]))
        .unwrap();
    engine.set_colours(ColourScheme::new());
    engine.rebuild().unwrap();
    engine.render_complete();
    engine
}

async fn wait_until_active(engine: &GroupingEngine, name: &str) {
    while !engine.active_comparisons().iter().any(|n| n == name) {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Chaos: Source Failures
// =============================================================================

#[tokio::test]
async fn chaos_one_failing_fetch_does_not_block_others() {
    let source = Arc::new(FailingSource::new(memory_source(), vec![2], "disk on fire"));
    let engine = engine_with(source.clone());

    let results = engine
        .add_comparisons(["run2", "run3", "run4"])
        .await
        .unwrap();

    assert_eq!(source.calls(), 3);
    let failed: Vec<&String> = results
        .iter()
        .filter(|(_, r)| matches!(r, Err(EngineError::Source(SourceError::Backend(_)))))
        .map(|(name, _)| name)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(engine.comparisons().len(), 2);
    assert!(!engine.active_comparisons().contains(failed[0]));

    // Remaining comparisons still diff cleanly
    let report = engine.diff(None, true).unwrap();
    assert_eq!(report.tables.len(), 2);
}

#[tokio::test]
async fn chaos_retry_after_transient_failure() {
    let source = Arc::new(FailingSource::new(memory_source(), vec![1], "timeout"));
    let engine = engine_with(source);

    assert!(engine.add_comparison("run2").await.is_err());
    assert!(engine.active_comparisons().is_empty());

    let entry = engine.add_comparison("run2").await.unwrap();
    assert_eq!(entry.name, "run2");
    assert_eq!(engine.comparisons().len(), 1);
}

#[tokio::test]
async fn chaos_permanent_failure_keeps_cached_comparisons() {
    let source = Arc::new(FailingSource::fail_after(memory_source(), 1, "gone"));
    let engine = engine_with(source);

    let first = engine.add_comparison("run2").await.unwrap();
    assert!(engine.add_comparison("run3").await.is_err());

    // Cached entries never touch the source again
    engine.clear_comparisons();
    let again = engine.add_comparison("run2").await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

// =============================================================================
// Chaos: Out-of-Order Completion
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chaos_out_of_order_completion_keeps_insertion_order() {
    let source = Arc::new(DelayedSource::new(
        memory_source(),
        &[("run2", 300), ("run3", 10), ("run4", 100)],
    ));
    let engine = engine_with(source.clone());

    let results = engine
        .add_comparisons(["run2", "run3", "run4"])
        .await
        .unwrap();

    assert_eq!(source.completed(), vec!["run3", "run4", "run2"]);
    let settled: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(settled, vec!["run3", "run4", "run2"]);

    let names: Vec<String> = engine.comparisons().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["run2", "run3", "run4"]);
}

#[tokio::test(start_paused = true)]
async fn chaos_removed_during_load_is_discarded() {
    let source = Arc::new(DelayedSource::new(memory_source(), &[("run2", 500)]));
    let engine = Arc::new(engine_with(source));

    let load = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.add_comparison("run2").await })
    };
    wait_until_active(&engine, "run2").await;
    assert!(engine.remove_comparison("run2"));

    let result = load.await.unwrap();
    assert!(matches!(result, Err(EngineError::Superseded(name)) if name == "run2"));
    assert!(engine.comparisons().is_empty());
    assert!(engine.active_comparisons().is_empty());
}

#[tokio::test(start_paused = true)]
async fn chaos_context_change_during_load_is_discarded() {
    let source = Arc::new(DelayedSource::new(memory_source(), &[("run2", 500)]));
    let engine = Arc::new(engine_with(source));

    let load = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.add_comparison("run2").await })
    };
    wait_until_active(&engine, "run2").await;

    // Rules change and the same dataset is re-added under the new context
    engine
        .set_rules(&RuleSet::from_pairs([("", "Everything")]))
        .unwrap();
    let fresh = engine.add_comparison("run2").await.unwrap();
    assert!(fresh.top_level_weights.contains_key("Everything"));

    let stale = load.await.unwrap();
    assert!(matches!(stale, Err(EngineError::Superseded(_))));

    let attached = engine.comparisons();
    assert_eq!(attached.len(), 1);
    assert!(Arc::ptr_eq(&attached[0], &fresh));
}

#[tokio::test(start_paused = true)]
async fn chaos_rapid_input_changes_discard_everything_in_flight() {
    let source = Arc::new(DelayedSource::new(
        memory_source(),
        &[("run2", 50), ("run3", 60), ("run4", 70)],
    ));
    let engine = Arc::new(engine_with(source));

    let loads = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.add_comparisons(["run2", "run3", "run4"]).await })
    };
    wait_until_active(&engine, "run4").await;

    for visible in [false, true, false] {
        engine.set_labels_visible(visible);
    }

    let results = loads.await.unwrap().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|(_, r)| matches!(r, Err(EngineError::Superseded(_)))));
    assert!(engine.comparisons().is_empty());
}

// =============================================================================
// Chaos: Rebuild Racing Input Changes
// =============================================================================

#[test]
fn chaos_rebuild_racing_rule_change_never_publishes_stale_tree() {
    let engine = engine_with(Arc::new(memory_source()));
    let mut big = Dataset::from_json(&run_json("big", 1.0, 1.0)).unwrap();
    big.modules = (0..200_000)
        .map(|i| Record::new("A", format!("a{i}")).with_resource("time_real", 1.0))
        .collect();
    engine.set_primary_dataset("big", big);

    for round in 0..5 {
        let group = format!("Round{round}");
        let outcome = std::thread::scope(|s| {
            let build = s.spawn(|| engine.rebuild());
            std::thread::sleep(Duration::from_millis(5));
            engine
                .set_rules(&RuleSet::from_pairs([("A|", group.as_str())]))
                .unwrap();
            build.join().unwrap()
        });

        if let Err(e) = &outcome {
            assert!(matches!(e, EngineError::Superseded(name) if name == "big"), "{e}");
        }
        match engine.primary_tree() {
            // Only a build that started after the change may survive
            Some(tree) => {
                assert_eq!(engine.state(), EngineState::Ready);
                assert!(tree.root.find(&[group.as_str()]).is_some());
            }
            None => assert_eq!(engine.state(), EngineState::Waiting),
        }
        engine.render_complete();
    }

    let tree = engine.rebuild().unwrap();
    assert!(tree.root.find(&["Round4"]).is_some());
    assert_eq!(tree.weight(), 20_000.0);
}

// =============================================================================
// Chaos: Processing Guard
// =============================================================================

#[tokio::test]
async fn chaos_concurrent_rebuilds_only_one_wins() {
    let engine = Arc::new(engine_with(Arc::new(memory_source())));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move { engine.rebuild().is_ok() }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
    assert!(engine.is_processing());

    engine.render_complete();
    assert!(engine.rebuild().is_ok());
}
