//! Field access over raw node records.
//!
//! Raw nodes are opaque keyed records ([`serde_json::Value`]); these helpers
//! resolve identity, label, children, disabled state and leaf-ness through a
//! [`FieldBindings`] mapping. A missing or malformed field always degrades to
//! the conventional default rather than failing.

use serde_json::Value;

use crate::config::FieldBindings;
use crate::node::NodeKey;

/// Resolves a node's identity.
///
/// Missing or non-scalar id fields resolve to the empty string key; id
/// uniqueness across a dataset is the caller's responsibility.
pub fn node_key(node: &Value, bindings: &FieldBindings) -> NodeKey {
    NodeKey::from_value(node.get(&bindings.id))
}

/// Resolves a node's display label, defaulting to an empty string.
pub fn node_label(node: &Value, bindings: &FieldBindings) -> String {
    match node.get(&bindings.label) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

/// Resolves a node's ordered child records, defaulting to an empty slice.
pub fn node_children<'a>(node: &'a Value, bindings: &FieldBindings) -> &'a [Value] {
    match node.get(&bindings.children) {
        Some(Value::Array(children)) => children.as_slice(),
        _ => &[],
    }
}

/// Resolves a node's disabled flag, defaulting to `false`.
pub fn node_disabled(node: &Value, bindings: &FieldBindings) -> bool {
    matches!(node.get(&bindings.disabled), Some(Value::Bool(true)))
}

/// Resolves whether a node is a leaf.
///
/// A node with children is never a leaf. A childless node honors its explicit
/// leaf override when present, and is otherwise a leaf.
pub fn node_is_leaf(node: &Value, bindings: &FieldBindings) -> bool {
    if !node_children(node, bindings).is_empty() {
        return false;
    }
    match node.get(&bindings.is_leaf) {
        Some(Value::Bool(flag)) => *flag,
        _ => true,
    }
}

/// Pre-order traversal over raw records.
///
/// The callback receives each node and its parent (or `None` for roots).
/// Returning `false` skips that node's subtree.
pub fn traverse<'a, F>(nodes: &'a [Value], bindings: &FieldBindings, callback: &mut F)
where
    F: FnMut(&'a Value, Option<&'a Value>) -> bool,
{
    fn walk<'a, F>(
        nodes: &'a [Value],
        parent: Option<&'a Value>,
        bindings: &FieldBindings,
        callback: &mut F,
    ) where
        F: FnMut(&'a Value, Option<&'a Value>) -> bool,
    {
        for node in nodes {
            if !callback(node, parent) {
                continue;
            }
            let children = node_children(node, bindings);
            if !children.is_empty() {
                walk(children, Some(node), bindings, callback);
            }
        }
    }
    walk(nodes, None, bindings, callback);
}

/// Finds the first node (pre-order) matching a predicate.
pub fn find_node<'a, F>(
    nodes: &'a [Value],
    bindings: &FieldBindings,
    predicate: F,
) -> Option<&'a Value>
where
    F: Fn(&Value) -> bool,
{
    fn walk<'a>(
        nodes: &'a [Value],
        bindings: &FieldBindings,
        predicate: &dyn Fn(&Value) -> bool,
    ) -> Option<&'a Value> {
        for node in nodes {
            if predicate(node) {
                return Some(node);
            }
            let children = node_children(node, bindings);
            if let Some(found) = walk(children, bindings, predicate) {
                return Some(found);
            }
        }
        None
    }
    walk(nodes, bindings, &predicate)
}

/// Finds a node by resolved key.
pub fn find_by_key<'a>(
    nodes: &'a [Value],
    bindings: &FieldBindings,
    key: &NodeKey,
) -> Option<&'a Value> {
    find_node(nodes, bindings, |node| node_key(node, bindings) == *key)
}

/// Collects every node key in pre-order.
pub fn collect_keys(nodes: &[Value], bindings: &FieldBindings) -> Vec<NodeKey> {
    let mut keys = Vec::new();
    traverse(nodes, bindings, &mut |node, _| {
        keys.push(node_key(node, bindings));
        true
    });
    keys
}

/// Collects the keys of every leaf node in pre-order.
pub fn collect_leaf_keys(nodes: &[Value], bindings: &FieldBindings) -> Vec<NodeKey> {
    let mut keys = Vec::new();
    traverse(nodes, bindings, &mut |node, _| {
        if node_is_leaf(node, bindings) {
            keys.push(node_key(node, bindings));
        }
        true
    });
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({
                "id": 1,
                "label": "Root",
                "children": [
                    {"id": 11, "label": "Branch", "children": [{"id": 111, "label": "Leaf"}]},
                    {"id": 12, "label": "Twig", "disabled": true},
                ],
            }),
            json!({"id": 2, "label": "Lone"}),
        ]
    }

    #[test]
    fn test_conventional_fields() {
        let bindings = FieldBindings::default();
        let nodes = sample();
        assert_eq!(node_key(&nodes[0], &bindings), NodeKey::from(1));
        assert_eq!(node_label(&nodes[0], &bindings), "Root");
        assert_eq!(node_children(&nodes[0], &bindings).len(), 2);
        assert!(!node_disabled(&nodes[0], &bindings));
        assert!(node_disabled(
            &nodes[0]["children"][1],
            &bindings
        ));
    }

    #[test]
    fn test_remapped_fields() {
        let bindings = FieldBindings::default()
            .with_id("key")
            .with_children("items");
        let node = json!({"key": "a", "items": [{"key": "b"}]});
        assert_eq!(node_key(&node, &bindings), NodeKey::from("a"));
        assert_eq!(node_children(&node, &bindings).len(), 1);
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let bindings = FieldBindings::default();
        let node = json!({});
        assert_eq!(node_key(&node, &bindings), NodeKey::from(""));
        assert_eq!(node_label(&node, &bindings), "");
        assert!(node_children(&node, &bindings).is_empty());
        assert!(!node_disabled(&node, &bindings));
        assert!(node_is_leaf(&node, &bindings));
    }

    #[test]
    fn test_leafness() {
        let bindings = FieldBindings::default();
        // Children present wins over any override.
        let parent = json!({"id": 1, "isLeaf": true, "children": [{"id": 2}]});
        assert!(!node_is_leaf(&parent, &bindings));
        // Explicit non-leaf override on a childless node (lazy-load parent).
        let lazy = json!({"id": 3, "isLeaf": false});
        assert!(!node_is_leaf(&lazy, &bindings));
        let leaf = json!({"id": 4});
        assert!(node_is_leaf(&leaf, &bindings));
    }

    #[test]
    fn test_traverse_order_and_skip() {
        let bindings = FieldBindings::default();
        let nodes = sample();

        let keys = collect_keys(&nodes, &bindings);
        assert_eq!(
            keys,
            vec![
                NodeKey::from(1),
                NodeKey::from(11),
                NodeKey::from(111),
                NodeKey::from(12),
                NodeKey::from(2),
            ]
        );

        // Returning false skips the subtree below node 11.
        let mut seen = Vec::new();
        traverse(&nodes, &bindings, &mut |node, _| {
            let key = node_key(node, &bindings);
            let descend = key != NodeKey::from(11);
            seen.push(key);
            descend
        });
        assert!(!seen.contains(&NodeKey::from(111)));
    }

    #[test]
    fn test_find_by_key() {
        let bindings = FieldBindings::default();
        let nodes = sample();
        let found = find_by_key(&nodes, &bindings, &NodeKey::from(111)).unwrap();
        assert_eq!(node_label(found, &bindings), "Leaf");
        assert!(find_by_key(&nodes, &bindings, &NodeKey::from(999)).is_none());
    }

    #[test]
    fn test_collect_leaf_keys() {
        let bindings = FieldBindings::default();
        let nodes = sample();
        assert_eq!(
            collect_leaf_keys(&nodes, &bindings),
            vec![NodeKey::from(111), NodeKey::from(12), NodeKey::from(2)]
        );
    }
}
