// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Weighted group tree.
//!
//! Every node owns its children outright: trees never share nodes, so a
//! comparison tree and the primary tree are always independent graphs.

use std::collections::BTreeMap;

use serde::Serialize;

/// A node in the weighted group tree.
///
/// Group nodes are created by walking a classification path; leaf nodes
/// stand for a single measurement record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
    pub label: String,
    /// Accumulated resource value, per-event after normalization
    pub weight: f64,
    /// Event count of the record, event fraction after normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Children in insertion order
    #[serde(rename = "groups", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GroupNode>,
    /// True if this node is a record, false if it is a group
    #[serde(skip)]
    pub is_leaf: bool,
}

impl GroupNode {
    /// Create an empty group node.
    pub fn group(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            weight: 0.0,
            events: None,
            ratio: None,
            color: None,
            id: None,
            children: Vec::new(),
            is_leaf: false,
        }
    }

    /// Create a leaf node for one record.
    pub fn leaf(label: impl Into<String>, weight: f64) -> Self {
        Self {
            weight,
            is_leaf: true,
            ..Self::group(label)
        }
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        !self.is_leaf
    }

    /// Child group with the given label (leaves are not considered).
    pub fn child_group(&self, label: &str) -> Option<&GroupNode> {
        self.children
            .iter()
            .find(|c| c.is_group() && c.label == label)
    }

    /// Iterate over child groups, skipping leaves.
    pub fn groups(&self) -> impl Iterator<Item = &GroupNode> {
        self.children.iter().filter(|c| c.is_group())
    }

    /// Descend by label equality, one segment per level.
    ///
    /// `["Tracking", "Pixels"]` -> the `Pixels` node under `Tracking`.
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&GroupNode> {
        let mut node = self;
        for segment in path {
            node = node.children.iter().find(|c| c.label == segment.as_ref())?;
        }
        Some(node)
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut GroupNode> {
        let mut node = self;
        for segment in path {
            node = node
                .children
                .iter_mut()
                .find(|c| c.label == segment.as_ref())?;
        }
        Some(node)
    }

    /// Number of nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Root of an aggregated dataset.
///
/// The root node carries the dataset's declared label; the tree also keeps
/// the raw total the dataset reports for the active resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTree {
    #[serde(flatten)]
    pub root: GroupNode,
    /// Raw dataset total for the active resource
    #[serde(rename = "expected", skip_serializing_if = "Option::is_none")]
    pub expected_weight: Option<f64>,
}

impl GroupTree {
    pub fn new(label: impl Into<String>, expected_weight: Option<f64>) -> Self {
        Self {
            root: GroupNode::group(label),
            expected_weight,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.root.label
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.root.weight
    }

    /// Top-level group label -> weight.
    pub fn top_level_weights(&self) -> BTreeMap<String, f64> {
        self.root
            .groups()
            .map(|g| (g.label.clone(), g.weight))
            .collect()
    }

    /// Set `id` on every node below the root.
    ///
    /// The id is the `.`-joined path of labels, each lowercased and stripped
    /// of non-alphanumeric characters: `Tracking|Pixel Tracks` becomes
    /// `tracking.pixeltracks`.
    pub fn assign_ids(&mut self) {
        let mut stack: Vec<(&mut GroupNode, String)> = self
            .root
            .children
            .iter_mut()
            .map(|c| (c, String::new()))
            .collect();

        while let Some((node, prefix)) = stack.pop() {
            let segment = id_segment(&node.label);
            let id = if prefix.is_empty() {
                segment
            } else {
                format!("{}.{}", prefix, segment)
            };
            node.id = Some(id.clone());
            for child in node.children.iter_mut() {
                stack.push((child, id.clone()));
            }
        }
    }
}

fn id_segment(label: &str) -> String {
    label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> GroupTree {
        let mut tree = GroupTree::new("HLT", Some(10.0));
        let mut tracking = GroupNode::group("Tracking");
        let mut pixels = GroupNode::group("Pixel Tracks");
        pixels.children.push(GroupNode::leaf("hltPixelTracks", 2.0));
        pixels.weight = 2.0;
        tracking.children.push(pixels);
        tracking.weight = 2.0;
        tree.root.children.push(tracking);
        tree.root.children.push(GroupNode::leaf("stray", 1.0));
        tree.root.weight = 3.0;
        tree
    }

    #[test]
    fn test_leaf_and_group() {
        let leaf = GroupNode::leaf("x", 1.5);
        assert!(leaf.is_leaf);
        assert_eq!(leaf.weight, 1.5);

        let group = GroupNode::group("g");
        assert!(group.is_group());
        assert_eq!(group.weight, 0.0);
    }

    #[test]
    fn test_find() {
        let tree = sample_tree();

        let node = tree.root.find(&["Tracking", "Pixel Tracks"]).unwrap();
        assert_eq!(node.weight, 2.0);
        assert!(tree.root.find(&["Tracking", "Missing"]).is_none());
        assert_eq!(tree.root.find::<&str>(&[]).unwrap().label, "HLT");
    }

    #[test]
    fn test_top_level_weights_skip_leaves() {
        let tree = sample_tree();
        let weights = tree.top_level_weights();

        assert_eq!(weights.len(), 1);
        assert_eq!(weights["Tracking"], 2.0);
    }

    #[test]
    fn test_assign_ids() {
        let mut tree = sample_tree();
        tree.assign_ids();

        let node = tree.root.find(&["Tracking", "Pixel Tracks", "hltPixelTracks"]).unwrap();
        assert_eq!(node.id.as_deref(), Some("tracking.pixeltracks.hltpixeltracks"));
        assert_eq!(tree.root.find(&["Tracking"]).unwrap().id.as_deref(), Some("tracking"));
        assert!(tree.root.id.is_none());
    }

    #[test]
    fn test_node_count() {
        assert_eq!(sample_tree().root.node_count(), 5);
    }

    #[test]
    fn test_serialize_shape() {
        let tree = sample_tree();
        let value = serde_json::to_value(&tree).unwrap();

        assert_eq!(value["label"], "HLT");
        assert_eq!(value["expected"], 10.0);
        assert_eq!(value["groups"][0]["label"], "Tracking");
        assert!(value["groups"][1].get("groups").is_none());
        assert!(value.get("is_leaf").is_none());
    }
}
