//! The tree engine.
//!
//! [`TreeEngine`] owns the flattened representation of one hierarchical
//! dataset: the id-keyed arena of [`FlatNode`]s, the full pre-order key list,
//! and the [`VisibleList`] window that expand/collapse operations maintain
//! incrementally. It exposes pure data operations and announces resulting
//! changes through [`TreeSignals`]; it never paints and never owns a scroll
//! container.
//!
//! # Example
//!
//! ```
//! use canopy::{TreeEngine, TreeOptions, NodeKey};
//! use serde_json::json;
//!
//! let data = vec![
//!     json!({"id": 1, "label": "Root", "children": [
//!         {"id": 11, "label": "First"},
//!         {"id": 12, "label": "Second"},
//!     ]}),
//!     json!({"id": 2, "label": "Lone"}),
//! ];
//! let mut engine = TreeEngine::new(data, TreeOptions::default());
//!
//! // Collapsed by default: only the roots occupy visible rows.
//! assert_eq!(engine.visible().len(), 2);
//!
//! engine.expand(&NodeKey::from(1));
//! assert_eq!(engine.visible().len(), 4);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use canopy_core::Signal;
use serde_json::Value;

use crate::accessor;
use crate::config::TreeOptions;
use crate::flatten;
use crate::node::{FlatNode, NodeKey};
use crate::visible::VisibleList;

/// Signals emitted by a [`TreeEngine`].
///
/// Collaborators connect to these to stay synchronized with the engine.
/// Dispatch is synchronous; every signal fires after the engine state it
/// describes is fully consistent. The visible window has its own
/// [`changed`](VisibleList::changed) signal on [`TreeEngine::visible`].
pub struct TreeSignals {
    /// Emitted once after a (re)generation settles.
    pub generated: Signal<()>,
    /// Emitted when a node is expanded through the public API.
    pub node_expanded: Signal<NodeKey>,
    /// Emitted when a node is collapsed through the public API.
    pub node_collapsed: Signal<NodeKey>,
    /// Emitted after a user-level selection operation, carrying the target.
    pub check_changed: Signal<NodeKey>,
    /// Emitted when the current (single-selected) node changes.
    pub current_changed: Signal<Option<NodeKey>>,
}

impl Default for TreeSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSignals {
    /// Creates a new set of engine signals.
    pub fn new() -> Self {
        Self {
            generated: Signal::new(),
            node_expanded: Signal::new(),
            node_collapsed: Signal::new(),
            check_changed: Signal::new(),
            current_changed: Signal::new(),
        }
    }
}

/// What a coalesced regeneration should reset.
///
/// Requests merge: two requests before a [`TreeEngine::flush`] produce one
/// regeneration with the union of their flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerateRequest {
    /// Re-derive the expanded key set from the configured defaults.
    pub reset_expanded: bool,
    /// Clear selection state and re-apply the configured default checks.
    pub reset_checked: bool,
    /// Emit [`TreeSignals::generated`] when the regeneration settles.
    pub emit_generated: bool,
}

impl RegenerateRequest {
    /// A full reset: expanded and checked state re-derived, completion
    /// announced.
    pub fn full() -> Self {
        Self {
            reset_expanded: true,
            reset_checked: true,
            emit_generated: true,
        }
    }
}

#[derive(Default)]
struct RegeneratePending {
    dirty: bool,
    request: RegenerateRequest,
}

/// The tree flattening and incremental state engine.
///
/// Owns the full flat list, the id index, and the visible window for one
/// dataset. All operations are synchronous and run to completion; deferred
/// work exists only as the pending-regeneration flags drained by
/// [`flush`](Self::flush).
///
/// Unknown keys are absent-value no-ops throughout: lookups return `None`,
/// mutations return silently. Duplicate resolved ids are an unchecked caller
/// precondition — the later node overwrites the earlier arena entry.
pub struct TreeEngine {
    pub(crate) options: TreeOptions,
    /// The raw dataset, retained for regeneration.
    pub(crate) raw: Vec<Value>,
    /// Materialized nodes keyed by identity (the id index).
    pub(crate) arena: HashMap<NodeKey, FlatNode>,
    /// Full flat list: every key in pre-order.
    pub(crate) order: Vec<NodeKey>,
    /// The visible window over the active view.
    pub(crate) visible: VisibleList,
    /// Pruned-view clones while a filter is active.
    pub(crate) filtered_arena: HashMap<NodeKey, FlatNode>,
    pub(crate) filtered_order: Vec<NodeKey>,
    pub(crate) is_filtered: bool,
    /// Keys whose nodes are expanded.
    pub(crate) expanded_keys: HashSet<NodeKey>,
    /// Keys whose nodes are fully checked.
    pub(crate) checked_keys: HashSet<NodeKey>,
    /// Keys whose nodes are indeterminate.
    pub(crate) half_checked_keys: HashSet<NodeKey>,
    pub(crate) current_key: Option<NodeKey>,
    pub(crate) current_data: Option<Arc<Value>>,
    pending: RegeneratePending,
    pub(crate) signals: TreeSignals,
}

impl TreeEngine {
    /// Creates an engine over `data` and performs the initial generation
    /// synchronously.
    pub fn new(data: Vec<Value>, options: TreeOptions) -> Self {
        let mut engine = Self {
            options,
            raw: data,
            arena: HashMap::new(),
            order: Vec::new(),
            visible: VisibleList::new(),
            filtered_arena: HashMap::new(),
            filtered_order: Vec::new(),
            is_filtered: false,
            expanded_keys: HashSet::new(),
            checked_keys: HashSet::new(),
            half_checked_keys: HashSet::new(),
            current_key: None,
            current_data: None,
            pending: RegeneratePending::default(),
            signals: TreeSignals::new(),
        };
        engine.request_regenerate(RegenerateRequest::full());
        engine.flush();
        engine
    }

    // =========================================================================
    // Views and queries
    // =========================================================================

    /// The engine's behavior options.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// The engine's signals.
    pub fn signals(&self) -> &TreeSignals {
        &self.signals
    }

    /// The visible window of the active view.
    pub fn visible(&self) -> &VisibleList {
        &self.visible
    }

    /// Returns `true` while a pruned (filtered) view is active.
    pub fn is_filtered(&self) -> bool {
        self.is_filtered
    }

    pub(crate) fn active_arena(&self) -> &HashMap<NodeKey, FlatNode> {
        if self.is_filtered {
            &self.filtered_arena
        } else {
            &self.arena
        }
    }

    pub(crate) fn active_arena_mut(&mut self) -> &mut HashMap<NodeKey, FlatNode> {
        if self.is_filtered {
            &mut self.filtered_arena
        } else {
            &mut self.arena
        }
    }

    pub(crate) fn active_order(&self) -> &[NodeKey] {
        if self.is_filtered {
            &self.filtered_order
        } else {
            &self.order
        }
    }

    /// Number of nodes in the active flat list.
    pub fn len(&self) -> usize {
        self.active_order().len()
    }

    /// Returns `true` if the active flat list is empty.
    pub fn is_empty(&self) -> bool {
        self.active_order().is_empty()
    }

    /// Every key of the active flat list, in pre-order.
    pub fn flat_keys(&self) -> &[NodeKey] {
        self.active_order()
    }

    /// Looks up a flat node in the active view.
    pub fn flat_node(&self, key: &NodeKey) -> Option<&FlatNode> {
        self.active_arena().get(key)
    }

    /// Looks up a node's raw record in the active view.
    pub fn node_data(&self, key: &NodeKey) -> Option<Arc<Value>> {
        self.flat_node(key).map(|node| node.data.clone())
    }

    /// Returns `true` if the node exists and is expanded.
    pub fn is_expanded(&self, key: &NodeKey) -> bool {
        self.flat_node(key).is_some_and(|node| node.is_expanded)
    }

    /// The expanded key set.
    pub fn expanded_keys(&self) -> &HashSet<NodeKey> {
        &self.expanded_keys
    }

    /// Iterates the visible rows of the active view, in row order.
    pub fn visible_nodes(&self) -> impl Iterator<Item = &FlatNode> {
        let arena = self.active_arena();
        self.visible.keys().iter().filter_map(move |key| arena.get(key))
    }

    /// Collects every descendant key of a node (active view), in pre-order.
    pub fn descendant_keys(&self, key: &NodeKey) -> Vec<NodeKey> {
        let arena = self.active_arena();
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = match arena.get(key) {
            Some(node) => node.children.iter().rev().cloned().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if let Some(node) = arena.get(&next) {
                stack.extend(node.children.iter().rev().cloned());
            }
            out.push(next);
        }
        out
    }

    /// Returns `true` if `other` lies in `root`'s subtree (or is `root`
    /// itself), following children links through the active arena.
    pub fn is_descendant(&self, root: &NodeKey, other: &NodeKey) -> bool {
        if root == other {
            return true;
        }
        let arena = self.active_arena();
        let mut stack: Vec<&NodeKey> = match arena.get(root) {
            Some(node) => node.children.iter().collect(),
            None => return false,
        };
        while let Some(next) = stack.pop() {
            if next == other {
                return true;
            }
            if let Some(node) = arena.get(next) {
                stack.extend(node.children.iter());
            }
        }
        false
    }

    // =========================================================================
    // Data lifecycle and coalesced regeneration
    // =========================================================================

    /// Replaces the raw dataset and requests a regeneration.
    ///
    /// The regeneration is deferred until [`flush`](Self::flush); a second
    /// `set_data` before the flush coalesces into the same regeneration and
    /// the superseded dataset is simply discarded.
    pub fn set_data(&mut self, data: Vec<Value>) {
        self.raw = data;
        self.request_regenerate(RegenerateRequest {
            reset_expanded: false,
            reset_checked: true,
            emit_generated: true,
        });
    }

    /// Replaces the raw dataset and regenerates synchronously.
    pub fn load(&mut self, data: Vec<Value>) {
        self.set_data(data);
        self.flush();
    }

    /// Sets the expand-all default and requests a regeneration.
    pub fn set_default_expand_all(&mut self, expand_all: bool) {
        self.options.default_expand_all = expand_all;
        self.request_regenerate(RegenerateRequest {
            reset_expanded: true,
            ..RegenerateRequest::default()
        });
    }

    /// Sets the default expanded keys and requests a regeneration.
    pub fn set_default_expanded_keys(&mut self, keys: Vec<NodeKey>) {
        self.options.default_expanded_keys = keys;
        self.request_regenerate(RegenerateRequest {
            reset_expanded: true,
            ..RegenerateRequest::default()
        });
    }

    /// Sets the default checked keys and requests a regeneration.
    pub fn set_default_checked_keys(&mut self, keys: Vec<NodeKey>) {
        self.options.default_checked_keys = keys;
        self.request_regenerate(RegenerateRequest {
            reset_checked: true,
            ..RegenerateRequest::default()
        });
    }

    /// Merges a regeneration request into the pending one.
    ///
    /// At most one regeneration is ever in flight: requests accumulate by
    /// flag union until [`flush`](Self::flush) drains them.
    pub fn request_regenerate(&mut self, request: RegenerateRequest) {
        self.pending.dirty = true;
        self.pending.request.reset_expanded |= request.reset_expanded;
        self.pending.request.reset_checked |= request.reset_checked;
        self.pending.request.emit_generated |= request.emit_generated;
    }

    /// Returns `true` if a regeneration is pending.
    pub fn has_pending_regenerate(&self) -> bool {
        self.pending.dirty
    }

    /// Performs the pending regeneration, if any.
    ///
    /// Returns `true` if a regeneration ran. [`TreeSignals::generated`] fires
    /// once afterwards when any coalesced request asked for it.
    pub fn flush(&mut self) -> bool {
        if !self.pending.dirty {
            return false;
        }
        let request = std::mem::take(&mut self.pending).request;
        tracing::debug!(
            target: "canopy::engine",
            node_count = self.raw.len(),
            reset_expanded = request.reset_expanded,
            reset_checked = request.reset_checked,
            "regenerating flat tree"
        );

        if request.reset_expanded {
            self.init_expanded_keys();
        }
        self.rebuild_from_raw();
        if request.reset_checked {
            self.init_checked();
        }
        self.init_current();

        if request.emit_generated {
            self.signals.generated.emit(());
        }
        true
    }

    fn init_expanded_keys(&mut self) {
        if self.options.default_expand_all {
            self.expanded_keys = accessor::collect_keys(&self.raw, &self.options.bindings)
                .into_iter()
                .collect();
        } else if !self.options.default_expanded_keys.is_empty() {
            self.expanded_keys = self.options.default_expanded_keys.iter().cloned().collect();
        } else {
            self.expanded_keys = HashSet::new();
        }
    }

    fn rebuild_from_raw(&mut self) {
        let result = flatten::flatten(
            &self.raw,
            0,
            None,
            0,
            true,
            &self.expanded_keys,
            &self.options.bindings,
        );
        self.arena = result.arena;
        self.order = result.order;
        // A full reload discards any active pruned view.
        self.filtered_arena.clear();
        self.filtered_order.clear();
        self.is_filtered = false;
        self.visible.replace(result.visible);
        self.refresh_visible_indexes();
        self.visible.notify();
    }

    fn init_checked(&mut self) {
        self.clear_checked_state();
        let defaults = self.options.default_checked_keys.clone();
        for key in defaults {
            if self.flat_node(&key).is_some() {
                self.apply_checked(&key, true, None);
            }
        }
        self.refresh_checked_sets();
    }

    fn init_current(&mut self) {
        if let Some(key) = self.options.current_node_key.clone() {
            self.current_data = self.node_data(&key);
            self.current_key = Some(key);
        }
    }

    // =========================================================================
    // Current (single-selected) node
    // =========================================================================

    /// The current node's key, if any.
    pub fn current_key(&self) -> Option<&NodeKey> {
        self.current_key.as_ref()
    }

    /// The current node's raw record, if any.
    pub fn current_data(&self) -> Option<&Arc<Value>> {
        self.current_data.as_ref()
    }

    /// Sets (or clears) the current node by key and announces the change.
    pub fn set_current_key(&mut self, key: Option<NodeKey>) {
        self.current_data = key.as_ref().and_then(|k| self.node_data(k));
        self.current_key = key.clone();
        self.signals.current_changed.emit(key);
    }

    /// Sets the current node from a raw record, resolving its key.
    pub fn set_current_node(&mut self, node: &Value) {
        let key = accessor::node_key(node, &self.options.bindings);
        self.set_current_key(Some(key));
    }

    // =========================================================================
    // Expand / collapse
    // =========================================================================

    /// Expands a node, revealing one level plus whatever was already expanded
    /// below it.
    ///
    /// In accordion mode, currently-expanded visible siblings are fully
    /// collapsed first. Leaves and already-expanded nodes are no-ops, as are
    /// nodes not present in the active view; if the node is present but
    /// hidden, only its expansion flag changes.
    pub fn expand(&mut self, key: &NodeKey) {
        let Some(node) = self.active_arena().get(key) else {
            return;
        };
        if node.is_leaf || node.is_expanded {
            return;
        }
        let parent = node.parent.clone();

        if self.options.accordion {
            // Siblings must be fully collapsed (and their visible-index
            // effects applied) before the target's own run is computed.
            let siblings: Vec<NodeKey> = {
                let arena = self.active_arena();
                self.active_order()
                    .iter()
                    .filter(|candidate| {
                        arena.get(*candidate).is_some_and(|n| {
                            n.parent == parent && &n.key != key && n.is_expanded
                        })
                    })
                    .cloned()
                    .collect()
            };
            for sibling in siblings {
                self.collapse_inner(&sibling);
            }
        }

        tracing::trace!(target: "canopy::engine", key = %key, "expanding node");
        if let Some(node) = self.active_arena_mut().get_mut(key) {
            node.is_expanded = true;
        }
        self.expanded_keys.insert(key.clone());
        self.expand_visible(key);
        self.signals.node_expanded.emit(key.clone());
    }

    /// Collapses a node and, recursively, every descendant, so a later
    /// re-expand does not implicitly re-expand grandchildren.
    ///
    /// Unknown and non-expanded nodes are no-ops; if the node is hidden, only
    /// the expansion flags change.
    pub fn collapse(&mut self, key: &NodeKey) {
        let Some(node) = self.active_arena().get(key) else {
            return;
        };
        if !node.is_expanded {
            return;
        }
        tracing::trace!(target: "canopy::engine", key = %key, "collapsing node");
        self.collapse_inner(key);
        self.signals.node_collapsed.emit(key.clone());
    }

    /// Expands or collapses a node based on its current state.
    pub fn toggle(&mut self, key: &NodeKey) {
        let Some(expanded) = self.flat_node(key).map(|node| node.is_expanded) else {
            return;
        };
        if expanded {
            self.collapse(key);
        } else {
            self.expand(key);
        }
    }

    /// Expands every non-leaf node of the active view.
    pub fn expand_all(&mut self) {
        let keys: Vec<NodeKey> = self.active_order().to_vec();
        for key in keys {
            let is_branch = match self.active_arena_mut().get_mut(&key) {
                Some(node) if !node.is_leaf => {
                    node.is_expanded = true;
                    true
                }
                _ => false,
            };
            if is_branch {
                self.expanded_keys.insert(key);
            }
        }
        self.rebuild_visible_nodes();
    }

    /// Collapses every node of the active view.
    pub fn collapse_all(&mut self) {
        let keys: Vec<NodeKey> = self.active_order().to_vec();
        for key in keys {
            if let Some(node) = self.active_arena_mut().get_mut(&key) {
                node.is_expanded = false;
            }
        }
        self.expanded_keys.clear();
        self.rebuild_visible_nodes();
    }

    fn collapse_inner(&mut self, key: &NodeKey) {
        self.collapse_visible(key);
        self.set_expanded_recursive(key, false);
    }

    /// The run of descendants currently occupying rows under an expanded
    /// node: its children, and recursively the children of each expanded
    /// child.
    pub(crate) fn collect_visible_descendants(&self, key: &NodeKey) -> Vec<NodeKey> {
        fn walk(
            arena: &HashMap<NodeKey, FlatNode>,
            key: &NodeKey,
            out: &mut Vec<NodeKey>,
        ) {
            let Some(node) = arena.get(key) else { return };
            for child in &node.children {
                out.push(child.clone());
                if arena.get(child).is_some_and(|n| n.is_expanded) {
                    walk(arena, child, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self.active_arena(), key, &mut out);
        out
    }

    fn expand_visible(&mut self, key: &NodeKey) {
        let Some(node) = self.active_arena().get(key) else {
            return;
        };
        // Hidden target: expansion flag changed, window untouched.
        let Some(row) = node.visible_index else {
            return;
        };
        let run = self.collect_visible_descendants(key);
        if run.is_empty() {
            return;
        }
        self.visible.insert_run(row + 1, run);
        self.refresh_visible_indexes();
        self.visible.notify();
    }

    fn collapse_visible(&mut self, key: &NodeKey) {
        let Some(node) = self.active_arena().get(key) else {
            return;
        };
        let Some(row) = node.visible_index else {
            return;
        };
        let run = self.collect_visible_descendants(key);
        if run.is_empty() {
            return;
        }
        let removed = self.visible.remove_run(row + 1, run.len());
        let arena = self.active_arena_mut();
        for gone in &removed {
            if let Some(node) = arena.get_mut(gone) {
                node.visible_index = None;
            }
        }
        self.refresh_visible_indexes();
        self.visible.notify();
    }

    fn set_expanded_recursive(&mut self, key: &NodeKey, expanded: bool) {
        let mut subtree = vec![key.clone()];
        subtree.extend(self.descendant_keys(key));
        for member in subtree {
            if expanded {
                self.expanded_keys.insert(member.clone());
            } else {
                self.expanded_keys.remove(&member);
            }
            if let Some(node) = self.active_arena_mut().get_mut(&member) {
                node.is_expanded = expanded;
            }
        }
    }

    /// Rewrites `visible_index` so the window reads `Some(0..n)` contiguously.
    pub(crate) fn refresh_visible_indexes(&mut self) {
        let keys: Vec<NodeKey> = self.visible.keys().to_vec();
        let arena = if self.is_filtered {
            &mut self.filtered_arena
        } else {
            &mut self.arena
        };
        for (row, key) in keys.iter().enumerate() {
            if let Some(node) = arena.get_mut(key) {
                node.visible_index = Some(row);
            }
        }
    }

    /// Rebuilds the visible window by a pre-order walk of the active view,
    /// honoring expansion state.
    pub(crate) fn rebuild_visible_nodes(&mut self) {
        fn walk(
            arena: &HashMap<NodeKey, FlatNode>,
            key: &NodeKey,
            out: &mut Vec<NodeKey>,
        ) {
            out.push(key.clone());
            let Some(node) = arena.get(key) else { return };
            if node.is_expanded {
                for child in &node.children {
                    walk(arena, child, out);
                }
            }
        }

        let mut result = Vec::new();
        {
            let arena = self.active_arena();
            for key in self.active_order() {
                if arena.get(key).is_some_and(|node| node.parent.is_none()) {
                    walk(arena, key, &mut result);
                }
            }
        }
        // Start from a clean slate so nodes that dropped out lose their row.
        for node in self.active_arena_mut().values_mut() {
            node.visible_index = None;
        }
        self.visible.replace(result);
        self.refresh_visible_indexes();
        self.visible.notify();
    }

    // =========================================================================
    // Structural mutation (lazy loading)
    // =========================================================================

    /// Marks a node as loading (lazy-load fetch in flight).
    pub fn mark_loading(&mut self, key: &NodeKey) {
        if let Some(node) = self.active_arena_mut().get_mut(key) {
            node.is_loading = true;
        }
    }

    /// Splices an already-fetched subtree under `parent_key`.
    ///
    /// The run is flattened as if rooted at the parent's level + 1 with
    /// pre-order indexes continuing from the parent, merged into the id
    /// index, spliced into the full list, and trailing indexes are
    /// renumbered immediately. If the parent currently occupies a visible
    /// row and is expanded, the run's visible prefix enters the window too.
    pub fn insert_subtree(&mut self, parent_key: &NodeKey, children: Vec<Value>) {
        let Some(parent) = self.arena.get(parent_key) else {
            return;
        };
        if children.is_empty() {
            return;
        }
        let level = parent.level + 1;
        let at = (parent.index + 1).min(self.order.len());
        let parent_row = parent.visible_index;
        let parent_expanded = parent.is_expanded;

        tracing::debug!(
            target: "canopy::engine",
            parent = %parent_key,
            child_count = children.len(),
            "splicing subtree"
        );

        let result = flatten::flatten(
            &children,
            level,
            Some(parent_key),
            at,
            true,
            &self.expanded_keys,
            &self.options.bindings,
        );

        for (key, node) in result.arena {
            self.arena.insert(key, node);
        }
        self.order.splice(at..at, result.order.iter().cloned());
        if let Some(parent) = self.arena.get_mut(parent_key) {
            parent.children = result.roots;
            parent.is_leaf = false;
        }
        // Every node at or after the insertion point gets its true pre-order
        // position back.
        for position in at..self.order.len() {
            let key = self.order[position].clone();
            if let Some(node) = self.arena.get_mut(&key) {
                node.index = position;
            }
        }

        if !self.is_filtered
            && parent_expanded
            && let Some(row) = parent_row
        {
            self.visible.insert_run(row + 1, result.visible);
            self.refresh_visible_indexes();
            self.visible.notify();
        }
    }

    /// Completes a lazy load: splices `children` and settles the parent's
    /// load flags and leaf-ness.
    pub fn load_children(&mut self, key: &NodeKey, children: Vec<Value>) {
        if self.arena.get(key).is_none() {
            return;
        }
        self.insert_subtree(key, children);
        if let Some(node) = self.arena.get_mut(key) {
            node.is_loading = false;
            node.is_loaded = true;
            node.is_leaf = node.children.is_empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({"id": 1, "label": "a", "children": [{"id": 11}, {"id": 12}]}),
            json!({"id": 2, "label": "b"}),
        ]
    }

    fn deep_sample() -> Vec<Value> {
        vec![
            json!({"id": 1, "children": [
                {"id": 11, "children": [{"id": 111}, {"id": 112}]},
                {"id": 12, "children": [{"id": 121}]},
            ]}),
            json!({"id": 2}),
        ]
    }

    fn visible_ids(engine: &TreeEngine) -> Vec<i64> {
        engine
            .visible()
            .keys()
            .iter()
            .map(|k| match k {
                NodeKey::Int(i) => *i,
                NodeKey::Str(_) => panic!("expected integer key"),
            })
            .collect()
    }

    fn assert_contiguous(engine: &TreeEngine) {
        for (row, key) in engine.visible().keys().iter().enumerate() {
            assert_eq!(
                engine.flat_node(key).unwrap().visible_index,
                Some(row),
                "row {row} out of place"
            );
        }
        let visible: HashSet<&NodeKey> = engine.visible().keys().iter().collect();
        for key in engine.flat_keys() {
            if !visible.contains(key) {
                assert_eq!(engine.flat_node(key).unwrap().visible_index, None);
            }
        }
    }

    fn assert_preorder_indexes(engine: &TreeEngine) {
        let mut previous: Option<usize> = None;
        for key in engine.flat_keys() {
            let index = engine.flat_node(key).unwrap().index;
            if let Some(previous) = previous {
                assert!(index > previous, "index not strictly increasing");
            }
            previous = Some(index);
        }
    }

    #[test]
    fn test_initial_generation() {
        let engine = TreeEngine::new(sample(), TreeOptions::default());
        assert_eq!(engine.len(), 4);
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        assert_contiguous(&engine);
        assert_preorder_indexes(&engine);
    }

    #[test]
    fn test_expand_and_collapse() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 2]);
        assert_contiguous(&engine);

        engine.collapse(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        assert_contiguous(&engine);
        assert_eq!(
            engine.flat_node(&NodeKey::from(11)).unwrap().visible_index,
            None
        );
    }

    #[test]
    fn test_collapse_expand_round_trip() {
        let mut engine = TreeEngine::new(deep_sample(), TreeOptions::default());
        engine.expand(&NodeKey::from(1));
        let before = visible_ids(&engine);

        engine.collapse(&NodeKey::from(1));
        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), before);
        assert_contiguous(&engine);
    }

    #[test]
    fn test_collapse_is_recursive() {
        let mut engine = TreeEngine::new(deep_sample(), TreeOptions::default());
        engine.expand(&NodeKey::from(1));
        engine.expand(&NodeKey::from(11));
        assert_eq!(visible_ids(&engine), vec![1, 11, 111, 112, 12, 2]);

        // Collapsing the root clears the grandchild's expansion too, so a
        // later re-expand reveals only one level.
        engine.collapse(&NodeKey::from(1));
        assert!(!engine.is_expanded(&NodeKey::from(11)));
        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 2]);
        assert_contiguous(&engine);
    }

    #[test]
    fn test_toggle_dispatches() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        engine.toggle(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 2]);
        engine.toggle(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        // Unknown keys are silent no-ops.
        engine.toggle(&NodeKey::from(99));
        assert_eq!(visible_ids(&engine), vec![1, 2]);
    }

    #[test]
    fn test_expand_hidden_node_touches_flags_only() {
        let mut engine = TreeEngine::new(deep_sample(), TreeOptions::default());
        // Node 11 is hidden (1 is collapsed); expanding it must not corrupt
        // the window.
        engine.expand(&NodeKey::from(11));
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        assert!(engine.is_expanded(&NodeKey::from(11)));
        assert_contiguous(&engine);

        // Expanding the root now reveals the pre-expanded child's level too.
        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 111, 112, 12, 2]);
        assert_contiguous(&engine);
    }

    #[test]
    fn test_leaf_expand_is_noop() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        engine.expand(&NodeKey::from(2));
        assert!(!engine.is_expanded(&NodeKey::from(2)));
        assert_eq!(visible_ids(&engine), vec![1, 2]);
    }

    #[test]
    fn test_accordion_collapses_siblings() {
        let data = vec![
            json!({"id": 1, "children": [{"id": 11}]}),
            json!({"id": 2, "children": [{"id": 21}]}),
        ];
        let mut engine =
            TreeEngine::new(data, TreeOptions::default().with_accordion(true));
        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 2]);

        engine.expand(&NodeKey::from(2));
        assert_eq!(visible_ids(&engine), vec![1, 2, 21]);
        assert!(!engine.is_expanded(&NodeKey::from(1)));
        assert_contiguous(&engine);
    }

    #[test]
    fn test_default_expand_all() {
        let engine = TreeEngine::new(
            deep_sample(),
            TreeOptions::default().with_default_expand_all(true),
        );
        assert_eq!(visible_ids(&engine), vec![1, 11, 111, 112, 12, 121, 2]);
        assert_contiguous(&engine);
    }

    #[test]
    fn test_default_expanded_keys() {
        let engine = TreeEngine::new(
            deep_sample(),
            TreeOptions::default().with_default_expanded_keys([1, 12]),
        );
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 121, 2]);
    }

    #[test]
    fn test_expand_all_collapse_all() {
        let mut engine = TreeEngine::new(deep_sample(), TreeOptions::default());
        engine.expand_all();
        assert_eq!(visible_ids(&engine), vec![1, 11, 111, 112, 12, 121, 2]);
        assert_contiguous(&engine);

        engine.collapse_all();
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        assert!(engine.expanded_keys().is_empty());
        assert_contiguous(&engine);
    }

    #[test]
    fn test_regeneration_coalesces() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        let generated = Arc::new(parking_lot::Mutex::new(0));
        let generated_clone = generated.clone();
        engine.signals().generated.connect(move |_| {
            *generated_clone.lock() += 1;
        });

        engine.set_data(vec![json!({"id": 3})]);
        engine.set_data(vec![json!({"id": 4}), json!({"id": 5})]);
        assert!(engine.has_pending_regenerate());
        // Stale dataset discarded; one regeneration, one signal.
        assert!(engine.flush());
        assert!(!engine.flush());
        assert_eq!(*generated.lock(), 1);
        assert_eq!(visible_ids(&engine), vec![4, 5]);
    }

    #[test]
    fn test_reload_preserves_expansion_unless_reset() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        engine.expand(&NodeKey::from(1));

        // Data replacement keeps the expanded key set (only checked state
        // resets), so the reloaded node 1 comes back expanded.
        engine.load(sample());
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 2]);

        engine.set_default_expanded_keys(Vec::new());
        engine.flush();
        assert_eq!(visible_ids(&engine), vec![1, 2]);
    }

    #[test]
    fn test_insert_subtree() {
        let mut engine = TreeEngine::new(
            vec![
                json!({"id": 1, "isLeaf": false}),
                json!({"id": 2}),
            ],
            TreeOptions::default(),
        );
        engine.expand(&NodeKey::from(1));
        engine.insert_subtree(&NodeKey::from(1), vec![json!({"id": 11}), json!({"id": 12})]);

        assert_eq!(engine.len(), 4);
        assert_eq!(visible_ids(&engine), vec![1, 11, 12, 2]);
        assert_preorder_indexes(&engine);
        assert_contiguous(&engine);
        let parent = engine.flat_node(&NodeKey::from(1)).unwrap();
        assert_eq!(parent.children.len(), 2);
    }

    #[test]
    fn test_insert_subtree_under_collapsed_parent() {
        let mut engine = TreeEngine::new(
            vec![json!({"id": 1, "isLeaf": false}), json!({"id": 2})],
            TreeOptions::default(),
        );
        engine.insert_subtree(&NodeKey::from(1), vec![json!({"id": 11})]);
        // Full list grew, window did not.
        assert_eq!(engine.len(), 3);
        assert_eq!(visible_ids(&engine), vec![1, 2]);
        assert_preorder_indexes(&engine);

        engine.expand(&NodeKey::from(1));
        assert_eq!(visible_ids(&engine), vec![1, 11, 2]);
    }

    #[test]
    fn test_load_children_settles_flags() {
        let mut engine = TreeEngine::new(
            vec![json!({"id": 1, "isLeaf": false})],
            TreeOptions::default(),
        );
        engine.mark_loading(&NodeKey::from(1));
        assert!(engine.flat_node(&NodeKey::from(1)).unwrap().is_loading);

        engine.load_children(&NodeKey::from(1), vec![json!({"id": 11})]);
        let parent = engine.flat_node(&NodeKey::from(1)).unwrap();
        assert!(!parent.is_loading);
        assert!(parent.is_loaded);
        assert!(!parent.is_leaf);
    }

    #[test]
    fn test_current_node_tracking() {
        let mut engine = TreeEngine::new(
            sample(),
            TreeOptions::default().with_current_node_key(2),
        );
        assert_eq!(engine.current_key(), Some(&NodeKey::from(2)));
        assert_eq!(
            engine.current_data().unwrap().get("label"),
            Some(&json!("b"))
        );

        let changes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        engine.signals().current_changed.connect(move |key| {
            changes_clone.lock().push(key.clone());
        });

        engine.set_current_key(Some(NodeKey::from(1)));
        engine.set_current_key(None);
        assert_eq!(
            *changes.lock(),
            vec![Some(NodeKey::from(1)), None]
        );
        assert!(engine.current_data().is_none());
    }

    #[test]
    fn test_descendant_and_reachability() {
        let engine = TreeEngine::new(deep_sample(), TreeOptions::default());
        let descendants = engine.descendant_keys(&NodeKey::from(1));
        assert_eq!(descendants.len(), 5);
        assert!(engine.is_descendant(&NodeKey::from(1), &NodeKey::from(112)));
        assert!(engine.is_descendant(&NodeKey::from(1), &NodeKey::from(1)));
        assert!(!engine.is_descendant(&NodeKey::from(2), &NodeKey::from(1)));
    }

    #[test]
    fn test_expand_collapse_signals() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let events_clone = events.clone();
        engine.signals().node_expanded.connect(move |key| {
            events_clone.lock().push(("expand", key.clone()));
        });
        let events_clone = events.clone();
        engine.signals().node_collapsed.connect(move |key| {
            events_clone.lock().push(("collapse", key.clone()));
        });

        engine.expand(&NodeKey::from(1));
        engine.collapse(&NodeKey::from(1));
        // Redundant calls stay silent.
        engine.collapse(&NodeKey::from(1));

        assert_eq!(
            *events.lock(),
            vec![
                ("expand", NodeKey::from(1)),
                ("collapse", NodeKey::from(1)),
            ]
        );
    }

    #[test]
    fn test_visible_changed_fires_once_per_operation() {
        let mut engine = TreeEngine::new(sample(), TreeOptions::default());
        let count = Arc::new(parking_lot::Mutex::new(0));
        let count_clone = count.clone();
        engine.visible().changed.connect(move |_| {
            *count_clone.lock() += 1;
        });

        engine.expand(&NodeKey::from(1));
        assert_eq!(*count.lock(), 1);
        engine.collapse(&NodeKey::from(1));
        assert_eq!(*count.lock(), 2);
    }
}
