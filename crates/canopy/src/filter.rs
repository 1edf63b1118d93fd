//! The pruned-view filter.
//!
//! Filtering derives a temporary parallel view: every node whose raw data
//! matches the predicate, plus every ancestor of a match, shallow-cloned and
//! re-linked. The engine's active list/map switch to the pruned pair while
//! the filter is live; the source nodes are never mutated, so clearing the
//! filter is just a view switch plus a visible-window rebuild.

use std::collections::HashMap;

use serde_json::Value;

use crate::accessor;
use crate::engine::TreeEngine;
use crate::node::{FlatNode, NodeKey};

/// Shallow-clones a node for the pruned view.
///
/// Flags and identity are copied, the raw record is shared, and children are
/// dropped to be rebuilt from the clone set.
fn clone_node(node: &FlatNode) -> FlatNode {
    FlatNode {
        children: Vec::new(),
        visible_index: None,
        ..node.clone()
    }
}

impl TreeEngine {
    /// Applies (or clears) the filter.
    ///
    /// An empty pattern restores the unfiltered view: filter-forced expansion
    /// is made permanent by marking every non-leaf node expanded, and the
    /// visible window is rebuilt from the full list. A non-empty pattern
    /// evaluates the configured predicate (default: case-insensitive label
    /// containment) against every node's raw data and builds the pruned view
    /// of matches and their ancestors, order-stably sorted by original
    /// pre-order index.
    pub fn filter(&mut self, pattern: &str) {
        self.filtered_order.clear();
        self.filtered_arena.clear();

        if pattern.is_empty() {
            tracing::debug!(target: "canopy::filter", "clearing filter");
            self.is_filtered = false;
            let keys: Vec<NodeKey> = self.order.clone();
            for key in keys {
                if let Some(node) = self.arena.get_mut(&key)
                    && !node.is_leaf
                {
                    node.is_expanded = true;
                    self.expanded_keys.insert(key);
                }
            }
            self.rebuild_visible_nodes();
            return;
        }

        tracing::debug!(target: "canopy::filter", pattern, "filtering nodes");
        self.is_filtered = true;
        self.expanded_keys.clear();

        let method = self.options.filter_node_method.clone();
        let bindings = self.options.bindings.clone();
        let needle = pattern.to_lowercase();
        let matches = |data: &Value| -> bool {
            match &method {
                Some(custom) => custom(pattern, data),
                None => accessor::node_label(data, &bindings)
                    .to_lowercase()
                    .contains(&needle),
            }
        };

        // Collect matches and clone them together with every ancestor not
        // yet cloned. Cloning a node implies its ancestors are (or become)
        // cloned, so the upward walk can stop at the first hit.
        let mut clones: HashMap<NodeKey, FlatNode> = HashMap::new();
        for key in &self.order {
            let Some(node) = self.arena.get(key) else {
                continue;
            };
            if !matches(&node.data) {
                continue;
            }
            if !clones.contains_key(key) {
                clones.insert(key.clone(), clone_node(node));
            }
            let mut cursor = node.parent.clone();
            while let Some(parent_key) = cursor {
                if clones.contains_key(&parent_key) {
                    break;
                }
                match self.arena.get(&parent_key) {
                    Some(parent) => {
                        clones.insert(parent_key, clone_node(parent));
                        cursor = parent.parent.clone();
                    }
                    None => break,
                }
            }
        }

        // Rebuild each clone's children from the clone set, order-stably
        // sorted by original index.
        let mut child_groups: HashMap<NodeKey, Vec<NodeKey>> = HashMap::new();
        for (key, node) in &clones {
            if let Some(parent_key) = &node.parent {
                child_groups
                    .entry(parent_key.clone())
                    .or_default()
                    .push(key.clone());
            }
        }
        for (parent_key, mut children) in child_groups {
            children.sort_by_key(|key| clones.get(key).map_or(usize::MAX, |n| n.index));
            if let Some(parent) = clones.get_mut(&parent_key) {
                parent.children = children;
                parent.is_expanded = true;
                self.expanded_keys.insert(parent_key);
            }
        }
        for node in clones.values_mut() {
            if node.children.is_empty() {
                node.is_leaf = true;
            }
        }

        // The pruned set in original pre-order becomes both the filtered
        // full list and the visible window.
        let mut ordered: Vec<NodeKey> = clones.keys().cloned().collect();
        ordered.sort_by_key(|key| clones[key].index);

        self.filtered_arena = clones;
        self.filtered_order = ordered.clone();
        self.visible.replace(ordered);
        self.refresh_visible_indexes();
        self.visible.notify();
    }
}
