//! Pre-order tree flattening.
//!
//! A single pass over the raw records produces everything the engine needs:
//! the full pre-order key list, the id-keyed arena of [`FlatNode`]s, and the
//! initial visible run. Visibility is inherited — a node enters the visible
//! run iff its parent was visible *and* expanded — so collapsed subtrees are
//! materialized but hidden.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::accessor;
use crate::config::FieldBindings;
use crate::node::{FlatNode, NodeKey};

/// The product of one flatten pass.
pub(crate) struct Flattened {
    /// Keys of the top-level records of this run, in order.
    pub roots: Vec<NodeKey>,
    /// Every key of the run in pre-order.
    pub order: Vec<NodeKey>,
    /// Materialized nodes, keyed by identity.
    pub arena: HashMap<NodeKey, FlatNode>,
    /// Keys of the run's visible nodes, in pre-order.
    pub visible: Vec<NodeKey>,
    /// First pre-order index after the run.
    pub next_index: usize,
}

/// Flattens `nodes` rooted at `level` with `parent`, numbering from
/// `start_index`.
///
/// `visible` seeds the inheritance chain: pass `true` when the run's roots
/// occupy visible rows. Expansion state is read from `expanded`. O(n) in the
/// number of records; duplicate resolved keys overwrite earlier arena
/// entries (caller responsibility, see crate docs).
pub(crate) fn flatten(
    nodes: &[Value],
    level: usize,
    parent: Option<&NodeKey>,
    start_index: usize,
    visible: bool,
    expanded: &HashSet<NodeKey>,
    bindings: &FieldBindings,
) -> Flattened {
    let mut result = Flattened {
        roots: Vec::new(),
        order: Vec::new(),
        arena: HashMap::new(),
        visible: Vec::new(),
        next_index: start_index,
    };
    result.roots = generate(
        nodes,
        level,
        parent,
        visible,
        expanded,
        bindings,
        &mut result,
    );
    result
}

fn generate(
    nodes: &[Value],
    level: usize,
    parent: Option<&NodeKey>,
    visible: bool,
    expanded: &HashSet<NodeKey>,
    bindings: &FieldBindings,
    out: &mut Flattened,
) -> Vec<NodeKey> {
    let mut direct = Vec::with_capacity(nodes.len());
    for raw in nodes {
        let key = accessor::node_key(raw, bindings);
        let children = accessor::node_children(raw, bindings);
        let is_expanded = expanded.contains(&key);

        let flat = FlatNode {
            key: key.clone(),
            level,
            index: out.next_index,
            visible_index: None,
            parent: parent.cloned(),
            is_expanded,
            is_disabled: accessor::node_disabled(raw, bindings),
            is_leaf: accessor::node_is_leaf(raw, bindings),
            is_checked: false,
            is_indeterminate: false,
            is_loading: false,
            is_loaded: false,
            children: Vec::new(),
            data: Arc::new(detach_children(raw, bindings)),
        };
        out.next_index += 1;
        out.order.push(key.clone());
        if visible {
            out.visible.push(key.clone());
        }
        out.arena.insert(key.clone(), flat);

        if !children.is_empty() {
            let child_keys = generate(
                children,
                level + 1,
                Some(&key),
                visible && is_expanded,
                expanded,
                bindings,
                out,
            );
            if let Some(node) = out.arena.get_mut(&key) {
                node.children = child_keys;
            }
        }
        direct.push(key);
    }
    direct
}

/// Copies a record without its children array.
///
/// The children become their own [`FlatNode`]s; keeping them in the stored
/// record would duplicate entire subtrees per level.
fn detach_children(raw: &Value, bindings: &FieldBindings) -> Value {
    match raw {
        Value::Object(map) => {
            let record = map
                .iter()
                .filter(|(field, _)| *field != &bindings.children)
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
            Value::Object(record)
        }
        other => other.clone(),
    }
}
