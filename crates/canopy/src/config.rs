//! Engine configuration: field bindings and behavior options.
//!
//! Raw datasets are duck-typed records, so the engine resolves node fields
//! through a small [`FieldBindings`] struct with conventional defaults
//! instead of scattering dynamic lookups through the codebase. Behavior
//! switches and pluggable predicates live on [`TreeOptions`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::drag::DropPosition;
use crate::node::NodeKey;

/// Type alias for a filter predicate.
///
/// Receives the filter pattern and a node's raw data; returns `true` if the
/// node matches and should be kept in the pruned view.
pub type FilterFn = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// Type alias for a drag permission predicate.
///
/// Receives the raw data of the node about to be dragged; returns `true` to
/// allow the drag to start.
pub type AllowDragFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Type alias for a drop permission predicate.
///
/// Receives the dragged node's raw data, the drop target's raw data, and the
/// classified position; returns `true` to allow the drop.
pub type AllowDropFn = Arc<dyn Fn(&Value, &Value, DropPosition) -> bool + Send + Sync>;

/// Field-name mapping from raw records to node properties.
///
/// Every binding falls back to the conventional field name, so an empty
/// (default) mapping works for datasets shaped like
/// `{"id": 1, "label": "Root", "children": [...]}`.
///
/// # Example
///
/// ```
/// use canopy::FieldBindings;
///
/// let bindings = FieldBindings::default()
///     .with_id("key")
///     .with_label("name");
/// assert_eq!(bindings.id, "key");
/// assert_eq!(bindings.children, "children");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBindings {
    /// Field holding the node's unique identity.
    pub id: String,
    /// Field holding the node's display label.
    pub label: String,
    /// Field holding the ordered child records.
    pub children: String,
    /// Field holding the disabled flag.
    pub disabled: String,
    /// Field holding the explicit leaf override.
    pub is_leaf: String,
}

impl Default for FieldBindings {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            label: "label".to_string(),
            children: "children".to_string(),
            disabled: "disabled".to_string(),
            is_leaf: "isLeaf".to_string(),
        }
    }
}

impl FieldBindings {
    /// Sets the identity field name.
    pub fn with_id(mut self, field: impl Into<String>) -> Self {
        self.id = field.into();
        self
    }

    /// Sets the label field name.
    pub fn with_label(mut self, field: impl Into<String>) -> Self {
        self.label = field.into();
        self
    }

    /// Sets the children field name.
    pub fn with_children(mut self, field: impl Into<String>) -> Self {
        self.children = field.into();
        self
    }

    /// Sets the disabled field name.
    pub fn with_disabled(mut self, field: impl Into<String>) -> Self {
        self.disabled = field.into();
        self
    }

    /// Sets the leaf-override field name.
    pub fn with_is_leaf(mut self, field: impl Into<String>) -> Self {
        self.is_leaf = field.into();
        self
    }
}

/// Behavior options for a [`TreeEngine`](crate::TreeEngine).
///
/// Built with consuming `with_*` methods:
///
/// ```
/// use canopy::{TreeOptions, FieldBindings};
///
/// let options = TreeOptions::default()
///     .with_bindings(FieldBindings::default().with_id("key"))
///     .with_default_expand_all(true)
///     .with_accordion(true);
/// ```
#[derive(Clone, Default)]
pub struct TreeOptions {
    /// Field-name mapping for raw records.
    pub bindings: FieldBindings,
    /// Disables parent/child cascade: checking a node affects only that node.
    pub check_strictly: bool,
    /// Expand every node on (re)generation.
    pub default_expand_all: bool,
    /// Keys expanded on (re)generation (ignored when `default_expand_all`).
    pub default_expanded_keys: Vec<NodeKey>,
    /// Keys checked on (re)generation.
    pub default_checked_keys: Vec<NodeKey>,
    /// Key of the initially current (single-selected) node.
    pub current_node_key: Option<NodeKey>,
    /// Accordion mode: expanding a node collapses its expanded siblings.
    pub accordion: bool,
    /// Filter predicate override. Defaults to a case-insensitive label match.
    pub filter_node_method: Option<FilterFn>,
    /// Drag permission override. Defaults to always allowed.
    pub allow_drag: Option<AllowDragFn>,
    /// Drop permission override. Defaults to rejecting drops inside the
    /// dragged node's own subtree.
    pub allow_drop: Option<AllowDropFn>,
}

impl TreeOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field-name mapping.
    pub fn with_bindings(mut self, bindings: FieldBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Sets strict (non-cascading) check mode.
    pub fn with_check_strictly(mut self, strictly: bool) -> Self {
        self.check_strictly = strictly;
        self
    }

    /// Sets whether every node starts expanded.
    pub fn with_default_expand_all(mut self, expand_all: bool) -> Self {
        self.default_expand_all = expand_all;
        self
    }

    /// Sets the keys expanded on generation.
    pub fn with_default_expanded_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<NodeKey>,
    {
        self.default_expanded_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the keys checked on generation.
    pub fn with_default_checked_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<NodeKey>,
    {
        self.default_checked_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the initially current node.
    pub fn with_current_node_key(mut self, key: impl Into<NodeKey>) -> Self {
        self.current_node_key = Some(key.into());
        self
    }

    /// Sets accordion (single expanded sibling) mode.
    pub fn with_accordion(mut self, accordion: bool) -> Self {
        self.accordion = accordion;
        self
    }

    /// Sets a custom filter predicate.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter_node_method = Some(Arc::new(filter));
        self
    }

    /// Sets a custom drag permission predicate.
    pub fn with_allow_drag<F>(mut self, allow: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.allow_drag = Some(Arc::new(allow));
        self
    }

    /// Sets a custom drop permission predicate.
    pub fn with_allow_drop<F>(mut self, allow: F) -> Self
    where
        F: Fn(&Value, &Value, DropPosition) -> bool + Send + Sync + 'static,
    {
        self.allow_drop = Some(Arc::new(allow));
        self
    }
}
