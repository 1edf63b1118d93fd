//! Node identity and the flattened node record.
//!
//! A tree is ingested as raw JSON-like records and materialized into
//! [`FlatNode`]s, one per raw node, stored in an id-keyed arena owned by the
//! engine. Parent/child links are [`NodeKey`]s resolved through that arena,
//! never embedded references, so structural mutation only ever touches map
//! entries.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Resolved identity of a tree node.
///
/// Raw datasets key their nodes with either strings or integers; both are
/// accepted and kept distinct (`NodeKey::from(1)` is not `NodeKey::from("1")`).
///
/// # Example
///
/// ```
/// use canopy::NodeKey;
///
/// let a = NodeKey::from("documents");
/// let b = NodeKey::from(42);
/// assert_ne!(NodeKey::from("42"), b);
/// assert_eq!(a.to_string(), "documents");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// Integer identity.
    Int(i64),
    /// String identity.
    Str(String),
}

impl NodeKey {
    /// Resolves a key from a raw field value.
    ///
    /// Numbers resolve to [`NodeKey::Int`] (fractional values fall back to
    /// their string form), strings to [`NodeKey::Str`]. Anything else —
    /// including a missing field — resolves to the empty string key, matching
    /// the conventional-fallback contract of the field accessor.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => NodeKey::Int(i),
                None => NodeKey::Str(n.to_string()),
            },
            Some(Value::String(s)) => NodeKey::Str(s.clone()),
            _ => NodeKey::Str(String::new()),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Int(i) => write!(f, "{i}"),
            NodeKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeKey {
    fn from(value: i64) -> Self {
        NodeKey::Int(value)
    }
}

impl From<i32> for NodeKey {
    fn from(value: i32) -> Self {
        NodeKey::Int(value as i64)
    }
}

impl From<u32> for NodeKey {
    fn from(value: u32) -> Self {
        NodeKey::Int(value as i64)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey::Str(value.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        NodeKey::Str(value)
    }
}

/// A materialized tree node.
///
/// One `FlatNode` exists per raw node. The flatten engine creates them in
/// bulk on load, the structural mutator adds them individually on lazy
/// insert, and a full reload discards them wholesale.
///
/// The raw record is held behind an `Arc` with its children array detached;
/// children are reachable through [`FlatNode::children`] and the engine's
/// arena instead.
#[derive(Debug, Clone)]
pub struct FlatNode {
    /// Resolved identity, unique across the flattened set.
    pub key: NodeKey,
    /// Depth from the root level (roots are 0).
    pub level: usize,
    /// Pre-order position in the full flattened list.
    pub index: usize,
    /// Position in the current visible window; `None` while hidden.
    pub visible_index: Option<usize>,
    /// Parent key; `None` for roots.
    pub parent: Option<NodeKey>,
    /// Whether this node's children are currently revealed.
    pub is_expanded: bool,
    /// Whether interaction with this node is disabled.
    pub is_disabled: bool,
    /// Whether this node can never have children.
    pub is_leaf: bool,
    /// Tri-state selection: fully checked. Mutually exclusive with
    /// `is_indeterminate`.
    pub is_checked: bool,
    /// Tri-state selection: some but not all descendants checked.
    pub is_indeterminate: bool,
    /// Lazy load in flight.
    pub is_loading: bool,
    /// Lazy load completed.
    pub is_loaded: bool,
    /// Keys of this node's direct children, in order.
    pub children: Vec<NodeKey>,
    /// The raw record (children detached), shared with any filtered clone.
    pub data: Arc<Value>,
}

impl FlatNode {
    /// Returns `true` if this node currently occupies a visible row.
    pub fn is_visible(&self) -> bool {
        self.visible_index.is_some()
    }

    /// Returns `true` if this node has at least one materialized child.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}
