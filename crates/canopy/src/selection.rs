//! Tri-state selection propagation.
//!
//! Checking a node cascades down to its descendants and up through its
//! ancestors: an ancestor whose children are all checked becomes checked,
//! one with none checked and none indeterminate becomes unchecked, and any
//! other mix becomes indeterminate. Strict mode disables the cascade and
//! touches only the target. `is_checked` and `is_indeterminate` are mutually
//! exclusive on every node, and a leaf is never indeterminate.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::TreeEngine;
use crate::node::NodeKey;

impl TreeEngine {
    // =========================================================================
    // Mutation
    // =========================================================================

    /// Sets a node's checked state.
    ///
    /// `strict` overrides the engine's configured `check_strictly` for this
    /// call; `None` uses the configured mode. In cascade mode the change
    /// propagates to every descendant and re-classifies every ancestor up to
    /// the root. Unknown keys are silent no-ops.
    pub fn set_checked(&mut self, key: &NodeKey, checked: bool, strict: Option<bool>) {
        if self.flat_node(key).is_none() {
            return;
        }
        tracing::trace!(target: "canopy::selection", key = %key, checked, "setting checked state");
        self.apply_checked(key, checked, strict);
        self.refresh_checked_sets();
        self.signals.check_changed.emit(key.clone());
    }

    /// Toggles a node's checked state under the configured mode.
    pub fn toggle_checked(&mut self, key: &NodeKey) {
        if self.flat_node(key).is_none() {
            return;
        }
        let checked = self.checked_keys.contains(key);
        self.set_checked(key, !checked, None);
    }

    /// Replaces the whole selection with `keys`.
    ///
    /// All prior selection state is cleared first. With `leaf_only`, keys
    /// resolving to non-leaf nodes are ignored. Each surviving key is applied
    /// under the configured mode, and in cascade mode the indeterminate key
    /// set is recomputed afterwards.
    pub fn set_checked_keys(&mut self, keys: &[NodeKey], leaf_only: bool) {
        self.clear_checked_state();
        let targets: Vec<NodeKey> = keys
            .iter()
            .filter(|key| {
                self.flat_node(key)
                    .is_some_and(|node| !leaf_only || node.is_leaf)
            })
            .cloned()
            .collect();
        for key in &targets {
            self.apply_checked(key, true, None);
        }
        self.refresh_checked_sets();
        if !self.options.check_strictly {
            self.update_half_checked_keys();
        }
        if let Some(last) = targets.last() {
            self.signals.check_changed.emit(last.clone());
        }
    }

    /// Replaces the whole selection with the given raw records, resolving
    /// their keys through the field bindings.
    pub fn set_checked_nodes(&mut self, nodes: &[Value], leaf_only: bool) {
        let bindings = self.options.bindings.clone();
        let keys: Vec<NodeKey> = nodes
            .iter()
            .filter(|node| !leaf_only || crate::accessor::node_is_leaf(node, &bindings))
            .map(|node| crate::accessor::node_key(node, &bindings))
            .collect();
        self.set_checked_keys(&keys, false);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Keys of the fully checked nodes.
    pub fn checked_keys(&self) -> &HashSet<NodeKey> {
        &self.checked_keys
    }

    /// Keys of the indeterminate nodes.
    pub fn half_checked_keys(&self) -> &HashSet<NodeKey> {
        &self.half_checked_keys
    }

    /// Checked keys in pre-order, optionally restricted to leaves.
    pub fn checked_node_keys(&self, leaf_only: bool) -> Vec<NodeKey> {
        self.order
            .iter()
            .filter(|key| {
                self.checked_keys.contains(*key)
                    && self.arena.get(*key).is_some_and(|node| {
                        !leaf_only || node.children.is_empty()
                    })
            })
            .cloned()
            .collect()
    }

    /// Raw records of the checked nodes in pre-order.
    ///
    /// `include_half_checked` unions the indeterminate set in; `leaf_only`
    /// keeps only nodes without children.
    pub fn checked_nodes(&self, leaf_only: bool, include_half_checked: bool) -> Vec<Arc<Value>> {
        self.order
            .iter()
            .filter_map(|key| {
                let selected = self.checked_keys.contains(key)
                    || (include_half_checked && self.half_checked_keys.contains(key));
                if !selected {
                    return None;
                }
                let node = self.arena.get(key)?;
                if leaf_only && !node.children.is_empty() {
                    return None;
                }
                Some(node.data.clone())
            })
            .collect()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Clears every node's selection flags and both key sets.
    pub(crate) fn clear_checked_state(&mut self) {
        for node in self.arena.values_mut() {
            node.is_checked = false;
            node.is_indeterminate = false;
        }
        for node in self.filtered_arena.values_mut() {
            node.is_checked = false;
            node.is_indeterminate = false;
        }
        self.checked_keys.clear();
        self.half_checked_keys.clear();
    }

    /// Applies a checked-state change without refreshing the key sets or
    /// emitting signals. Resolves the target through the active view, so a
    /// cascade during a filter touches the pruned clones, never the source.
    pub(crate) fn apply_checked(&mut self, key: &NodeKey, checked: bool, strict: Option<bool>) {
        let strict = strict.unwrap_or(self.options.check_strictly);
        if strict {
            if let Some(node) = self.active_arena_mut().get_mut(key) {
                node.is_checked = checked;
                node.is_indeterminate = false;
            }
            return;
        }

        // Downward: the target and every descendant take the new state.
        let mut downward = vec![key.clone()];
        downward.extend(self.descendant_keys(key));
        {
            let arena = self.active_arena_mut();
            for member in &downward {
                if let Some(node) = arena.get_mut(member) {
                    node.is_checked = checked;
                    node.is_indeterminate = false;
                }
            }
        }

        // Upward: re-classify each ancestor from its children's counts.
        let mut cursor = self
            .active_arena()
            .get(key)
            .and_then(|node| node.parent.clone());
        while let Some(parent_key) = cursor {
            let (children, next) = match self.active_arena().get(&parent_key) {
                Some(parent) => (parent.children.clone(), parent.parent.clone()),
                None => break,
            };
            // Leaves short-circuit out of the classification entirely.
            if !children.is_empty() {
                let arena = self.active_arena();
                let checked_count = children
                    .iter()
                    .filter(|child| arena.get(*child).is_some_and(|n| n.is_checked))
                    .count();
                let indeterminate_count = children
                    .iter()
                    .filter(|child| arena.get(*child).is_some_and(|n| n.is_indeterminate))
                    .count();

                let (is_checked, is_indeterminate) = if checked_count == children.len() {
                    (true, false)
                } else if checked_count == 0 && indeterminate_count == 0 {
                    (false, false)
                } else {
                    (false, true)
                };
                if let Some(parent) = self.active_arena_mut().get_mut(&parent_key) {
                    parent.is_checked = is_checked;
                    parent.is_indeterminate = is_indeterminate;
                }
            }
            cursor = next;
        }
    }

    /// Re-derives the checked and indeterminate key sets from node flags.
    pub(crate) fn refresh_checked_sets(&mut self) {
        self.checked_keys = self
            .order
            .iter()
            .filter(|key| self.arena.get(*key).is_some_and(|n| n.is_checked))
            .cloned()
            .collect();
        self.half_checked_keys = self
            .order
            .iter()
            .filter(|key| self.arena.get(*key).is_some_and(|n| n.is_indeterminate))
            .cloned()
            .collect();
    }

    /// Recomputes the indeterminate key set from descendant membership in the
    /// checked set: a node with some but not all descendants checked is half
    /// checked.
    pub fn update_half_checked_keys(&mut self) {
        self.half_checked_keys.clear();
        let keys: Vec<NodeKey> = self.order.clone();
        for key in keys {
            let descendants = self.descendant_keys_unfiltered(&key);
            if descendants.is_empty() {
                continue;
            }
            let checked = descendants
                .iter()
                .filter(|d| self.checked_keys.contains(*d))
                .count();
            if checked > 0 && checked < descendants.len() {
                self.half_checked_keys.insert(key);
            }
        }
    }

    /// Descendants through the unfiltered arena, for key-set bookkeeping.
    fn descendant_keys_unfiltered(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = match self.arena.get(key) {
            Some(node) => node.children.iter().rev().cloned().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if let Some(node) = self.arena.get(&next) {
                stack.extend(node.children.iter().rev().cloned());
            }
            out.push(next);
        }
        out
    }
}
