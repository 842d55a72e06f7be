// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Colour assignment for group nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::{split_path, RuleError};

use super::group_node::GroupNode;

/// Group path (`|`-joined labels) -> colour string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColourScheme {
    entries: BTreeMap<String, String>,
}

impl ColourScheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{ "Group|Sub": "#rrggbb" }` object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RuleError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set the colour of every existing node a scheme entry points at.
///
/// Entries whose path does not resolve are ignored; no node is ever created.
/// Returns the number of nodes coloured.
pub fn assign_colours(root: &mut GroupNode, scheme: &ColourScheme) -> usize {
    let mut applied = 0;
    for (path, colour) in scheme.iter() {
        match root.find_mut(&split_path(path)) {
            Some(node) => {
                node.color = Some(colour.to_string());
                applied += 1;
            }
            None => debug!(path, "Colour path not present in tree"),
        }
    }
    applied
}
