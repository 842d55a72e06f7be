// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic grouping-engine usage example.
//!
//! Demonstrates:
//! 1. Loading three timing runs into an in-memory source
//! 2. Building the primary group tree from rules and colours
//! 3. Comparing against two other runs (loaded concurrently)
//! 4. Absolute, relative and focused diffs plus the stacked view
//! 5. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=grouping_engine=debug cargo run --example basic_usage
//! ```

use std::sync::Arc;

use grouping_engine::{
    ColourScheme, GroupingConfig, GroupingEngine, InMemorySource, RuleSet,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const RULES: &str = r#"{
    "PixelTrackProducer|hltPixel*": "Tracking|Pixels",
    "|hltIter?Tracks": "Tracking|Iterative",
    "|hltEcal*": "Calorimetry|ECAL",
    "|hltHcal*": "Calorimetry|HCAL",
    "VertexProducer|": "Vertices"
}"#;

const COLOURS: &str = r##"{
    "Tracking": "#3f90da",
    "Tracking|Pixels": "#92dadd",
    "Calorimetry": "#ffa90e",
    "Vertices": "#bd1f01"
}"##;

fn run_json(label: &str, scale: f64) -> Vec<u8> {
    let modules = [
        ("PixelTrackProducer", "hltPixelTracks", 200.0),
        ("PixelTrackProducer", "hltPixelVertices", 100.0),
        ("TrackProducer", "hltIter0Tracks", 300.0),
        ("TrackProducer", "hltIter1Tracks", 50.0),
        ("EcalProducer", "hltEcalUncalib", 100.0),
        ("HcalProducer", "hltHcalReco", 80.0),
        ("VertexProducer", "hltVertices", 20.0),
        ("DQMEDAnalyzer", "dqmMonitor", 10.0),
    ];
    let modules: Vec<serde_json::Value> = modules
        .iter()
        .map(|(kind, name, time)| {
            serde_json::json!({ "type": kind, "label": name, "time_real": time * scale, "events": 100 })
        })
        .collect();

    serde_json::to_vec(&serde_json::json!({
        "total": { "label": label, "events": 100, "time_real": 860.0 * scale },
        "resources": [ { "time_real": "real time" } ],
        "modules": modules,
    }))
    .expect("static json")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures every metric the engine emits)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║          grouping-engine: Basic Usage Example                 ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Seed the dataset source
    // ─────────────────────────────────────────────────────────────────────────
    let source = InMemorySource::new();
    source.insert_json("baseline", &run_json("baseline", 1.0))?;
    source.insert_json("patched", &run_json("patched", 0.8))?;
    source.insert_json("regressed", &run_json("regressed", 1.4))?;
    println!("📦 Source holds {} datasets", source.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Configure the engine and build the primary tree
    // ─────────────────────────────────────────────────────────────────────────
    let config = GroupingConfig {
        resource: Some("time_real".into()),
        ..Default::default()
    };
    let (_config_tx, config_rx) = watch::channel(config.clone());
    let engine = GroupingEngine::new(config, config_rx, Arc::new(source));

    engine.load_primary("baseline").await?;
    let version = engine.set_rules(&RuleSet::from_json(RULES.as_bytes())?)?;
    engine.set_colours(ColourScheme::from_json(COLOURS.as_bytes())?);
    println!("📐 Rule set version {}", version);

    let tree = engine.rebuild()?;
    engine.render_complete();
    println!("\n🌳 Primary tree ({:.2} per event):", tree.weight());
    println!("{}", serde_json::to_string_pretty(tree.as_ref())?);

    if let Some(report) = engine.last_report() {
        for record in &report.unassigned {
            println!("   ⚠️  Unassigned: {}", record);
        }
    }

    println!("\n📋 Summary:");
    for row in engine.summary()? {
        println!(
            "   └─ {:<12} {:>8.2} {:>6.1}% {}",
            row.label,
            row.value,
            row.percent,
            row.color.as_deref().unwrap_or("")
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Comparisons
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔀 Loading comparisons...");
    for (name, result) in engine.add_comparisons(["patched", "regressed"]).await? {
        match result {
            Ok(entry) => println!("   ✅ {} (total {:.2})", name, entry.total),
            Err(e) => println!("   ❌ {}: {}", name, e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Diffs and the stacked view
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Absolute diff:");
    println!("{}", serde_json::to_string_pretty(&engine.diff(None, false)?)?);

    println!("\n📊 Relative diff focused on Tracking:");
    println!("{}", serde_json::to_string_pretty(&engine.diff(Some("Tracking"), true)?)?);

    println!("\n📊 Stacked view:");
    println!("{}", serde_json::to_string_pretty(&engine.stacked()?)?);

    let stats = engine.cache_stats();
    println!(
        "\n🗄️  Comparison cache: {} entries, {} hits, {} misses",
        stats.entry_count, stats.hits, stats.misses
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Dump raw metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n✨ Done! State: {}", engine.state());
    Ok(())
}

/// Dump all captured metrics in a readable format
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, label_str, count, sum));
            }
        }
    }

    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, labels, value) in &counters {
        println!("   ├─ {}{} = {}", name, labels, value);
    }
    for (name, labels, value) in &gauges {
        println!("   ├─ {}{} = {:.2}", name, labels, value);
    }
    for (name, labels, count, sum) in &histograms {
        println!("   ├─ {}{} count={} sum={:.6}s", name, labels, count, sum);
    }

    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
