// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Weighted group trees: aggregation, normalization, colouring.
//!
//! # Pipeline
//!
//! ```text
//! Dataset ──classify──► (path, Record) ──aggregate──► raw tree
//!                                                       │
//!                                   normalize(total.events)
//!                                                       │
//!                                      assign_colours ──► GroupTree
//! ```
//!
//! Trees are plain owned values. The primary tree is rebuilt from scratch
//! on every input change; comparison trees are built the same way and never
//! share nodes with it.

mod aggregator;
mod colour;
mod group_node;
mod summary;

pub use aggregator::{aggregate, normalize, AggregationReport, TreeAggregator};
pub use colour::{assign_colours, ColourScheme};
pub use group_node::{GroupNode, GroupTree};
pub use summary::{summarize, SummaryRow};
