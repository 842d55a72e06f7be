// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Measurement dataset data structures.
//!
//! A [`Dataset`] is one measurement run: a `total` row describing the whole
//! job, the list of resources that were measured, and one [`Record`] per
//! framework module. Every numeric field of a module row other than
//! `events` and `ratio` is a resource value.
//!
//! # Example
//!
//! ```
//! use grouping_engine::Dataset;
//!
//! let dataset = Dataset::from_json(br#"{
//!     "total": { "label": "HLT", "events": 100, "time_real": 4200.0 },
//!     "resources": [ { "time_real": "real time" } ],
//!     "modules": [
//!         { "type": "PixelProducer", "label": "hltPixels", "events": 100, "time_real": 1200.0 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(dataset.total.label, "HLT");
//! assert_eq!(dataset.modules[0].resource("time_real"), Some(1200.0));
//! assert_eq!(dataset.resources[0].unit(), " ms");
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Malformed dataset JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Datasets describe different resources: expected {expected:?}, found {found:?}")]
    ResourceMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// One measurement row: a single framework module.
///
/// Immutable input to the engine. The `kind` is the module's native
/// classification (its C++ type), the `label` its instance name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRow", into = "RawRow")]
pub struct Record {
    /// Classification discriminator (serialized as `type`)
    pub kind: String,
    /// Instance identifier
    pub label: String,
    /// Resource name -> measured value
    pub resource_values: BTreeMap<String, f64>,
    /// Number of events the module ran on (serialized as `events`)
    pub event_count: Option<f64>,
    pub ratio: Option<f64>,
}

impl Record {
    /// Create a record with no measurements.
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            resource_values: BTreeMap::new(),
            event_count: None,
            ratio: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>, value: f64) -> Self {
        self.resource_values.insert(resource.into(), value);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: f64) -> Self {
        self.event_count = Some(events);
        self
    }

    #[must_use]
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = Some(ratio);
        self
    }

    /// Value of a resource, `None` when the field is absent.
    #[inline]
    pub fn resource(&self, resource: &str) -> Option<f64> {
        self.resource_values.get(resource).copied()
    }

    /// `kind|label`, the identity used when merging datasets.
    pub fn key(&self) -> String {
        format!("{}|{}", self.kind, self.label)
    }
}

/// The job-wide summary row of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRow", into = "RawRow")]
pub struct DatasetTotal {
    /// Process name, becomes the root label of the aggregated tree
    pub label: String,
    /// Total number of processed events (the normalization divisor)
    pub events: f64,
    pub ratio: Option<f64>,
    pub resource_values: BTreeMap<String, f64>,
}

impl DatasetTotal {
    #[inline]
    pub fn resource(&self, resource: &str) -> Option<f64> {
        self.resource_values.get(resource).copied()
    }
}

/// A measured resource: its key in the module rows and a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub key: String,
    pub name: String,
}

impl ResourceInfo {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    /// Display unit derived from the key prefix.
    pub fn unit(&self) -> &'static str {
        if self.key.starts_with("time_") {
            " ms"
        } else if self.key.starts_with("mem_") {
            " kB"
        } else {
            ""
        }
    }

    /// Axis title derived from the key prefix.
    pub fn title(&self) -> &'static str {
        if self.key.starts_with("time_") {
            "Time"
        } else if self.key.starts_with("mem_") {
            "Memory"
        } else {
            ""
        }
    }
}

/// One complete measurement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDataset", into = "RawDataset")]
pub struct Dataset {
    pub total: DatasetTotal,
    pub resources: Vec<ResourceInfo>,
    pub modules: Vec<Record>,
}

impl Dataset {
    /// Parse a dataset from raw JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DatasetError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse a dataset from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, DatasetError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Resource keys in declaration order.
    pub fn resource_keys(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.key.clone()).collect()
    }

    pub fn resource_info(&self, key: &str) -> Option<&ResourceInfo> {
        self.resources.iter().find(|r| r.key == key)
    }

    /// Merge another run of the same job into this one.
    ///
    /// Event counts and every declared metric are summed, both for the total
    /// and for modules present in both runs (matched by `type|label`).
    /// Modules only present in `other` are appended.
    pub fn merge(&mut self, other: &Dataset) -> Result<(), DatasetError> {
        let metrics = self.resource_keys();
        let other_metrics = other.resource_keys();
        if metrics != other_metrics {
            return Err(DatasetError::ResourceMismatch {
                expected: metrics,
                found: other_metrics,
            });
        }

        if self.total.label != other.total.label {
            warn!(
                ours = %self.total.label,
                theirs = %other.total.label,
                "Merging datasets with different process names"
            );
        }

        self.total.events += other.total.events;
        add_metrics(&metrics, &mut self.total.resource_values, &other.total.resource_values);

        let mut index: HashMap<String, usize> = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.key(), i))
            .collect();

        for module in &other.modules {
            match index.get(&module.key()) {
                Some(&i) => {
                    let dest = &mut self.modules[i];
                    if let Some(events) = module.event_count {
                        *dest.event_count.get_or_insert(0.0) += events;
                    }
                    add_metrics(&metrics, &mut dest.resource_values, &module.resource_values);
                }
                None => {
                    index.insert(module.key(), self.modules.len());
                    self.modules.push(module.clone());
                }
            }
        }

        Ok(())
    }
}

fn add_metrics(metrics: &[String], dest: &mut BTreeMap<String, f64>, src: &BTreeMap<String, f64>) {
    for metric in metrics {
        if let Some(value) = src.get(metric) {
            *dest.entry(metric.clone()).or_insert(0.0) += value;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire shapes: rows keep their resources as sibling numeric fields
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRow {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    events: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ratio: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RawRow {
    fn numeric_fields(extra: Map<String, Value>) -> BTreeMap<String, f64> {
        extra
            .into_iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k, n)))
            .collect()
    }

    fn with_values(mut self, values: BTreeMap<String, f64>) -> Self {
        for (k, v) in values {
            if let Some(n) = serde_json::Number::from_f64(v) {
                self.extra.insert(k, Value::Number(n));
            }
        }
        self
    }
}

impl From<RawRow> for Record {
    fn from(raw: RawRow) -> Self {
        Self {
            kind: raw.kind.unwrap_or_default(),
            label: raw.label,
            resource_values: RawRow::numeric_fields(raw.extra),
            event_count: raw.events,
            ratio: raw.ratio,
        }
    }
}

impl From<Record> for RawRow {
    fn from(record: Record) -> Self {
        RawRow {
            kind: Some(record.kind),
            label: record.label,
            events: record.event_count,
            ratio: record.ratio,
            extra: Map::new(),
        }
        .with_values(record.resource_values)
    }
}

impl From<RawRow> for DatasetTotal {
    fn from(raw: RawRow) -> Self {
        Self {
            label: raw.label,
            events: raw.events.unwrap_or(0.0),
            ratio: raw.ratio,
            resource_values: RawRow::numeric_fields(raw.extra),
        }
    }
}

impl From<DatasetTotal> for RawRow {
    fn from(total: DatasetTotal) -> Self {
        RawRow {
            kind: None,
            label: total.label,
            events: Some(total.events),
            ratio: total.ratio,
            extra: Map::new(),
        }
        .with_values(total.resource_values)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDataset {
    total: DatasetTotal,
    #[serde(default)]
    resources: Vec<Map<String, Value>>,
    #[serde(default)]
    modules: Vec<Record>,
}

impl From<RawDataset> for Dataset {
    fn from(raw: RawDataset) -> Self {
        let resources = raw
            .resources
            .into_iter()
            .flat_map(|entry| entry.into_iter())
            .map(|(key, name)| {
                let name = match name {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                ResourceInfo { key, name }
            })
            .collect();

        Self {
            total: raw.total,
            resources,
            modules: raw.modules,
        }
    }
}

impl From<Dataset> for RawDataset {
    fn from(dataset: Dataset) -> Self {
        let resources = dataset
            .resources
            .into_iter()
            .map(|r| {
                let mut entry = Map::new();
                entry.insert(r.key, Value::String(r.name));
                entry
            })
            .collect();

        Self {
            total: dataset.total,
            resources,
            modules: dataset.modules,
        }
    }
}
