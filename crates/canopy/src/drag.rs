//! Drag-and-drop classification.
//!
//! The classifier turns a pointer offset within a target row into a relative
//! drop position, validates it through the configured permission predicates,
//! and produces a [`DropIntent`] on a completed gesture. It performs no
//! mutation — reparenting is the caller's responsibility — and a predicate
//! returning `false` silently blocks the gesture (permission denial is not
//! exceptional).

use std::sync::Arc;

use serde_json::Value;

use crate::engine::TreeEngine;
use crate::node::NodeKey;

/// Relative drop position within a target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropPosition {
    /// Drop as the target's previous sibling.
    Before,
    /// Drop as the target's child.
    Inside,
    /// Drop as the target's next sibling.
    After,
}

/// Classifies a pointer offset within a row (0 = top edge, 1 = bottom edge).
///
/// The row divides into thirds: the top third maps to [`DropPosition::Before`],
/// the bottom third to [`DropPosition::After`], the middle band to
/// [`DropPosition::Inside`].
pub fn classify_offset(offset: f32) -> DropPosition {
    if offset < 1.0 / 3.0 {
        DropPosition::Before
    } else if offset > 2.0 / 3.0 {
        DropPosition::After
    } else {
        DropPosition::Inside
    }
}

/// The result of a completed drop gesture.
///
/// Carries the raw records so the collaborator that owns the dataset can
/// perform the actual reparenting.
#[derive(Debug, Clone)]
pub struct DropIntent {
    /// Raw record of the dragged node.
    pub dragging: Arc<Value>,
    /// Raw record of the drop target.
    pub target: Arc<Value>,
    /// Where the dragged node lands relative to the target.
    pub position: DropPosition,
}

/// Tracks one drag gesture over an engine's rows.
///
/// The tracker owns only gesture state (what is dragged, what is hovered,
/// the last valid position); all node resolution goes through the engine
/// passed to each call.
///
/// # Example
///
/// ```
/// use canopy::{DragTracker, DropPosition, NodeKey, TreeEngine, TreeOptions};
/// use serde_json::json;
///
/// let engine = TreeEngine::new(
///     vec![json!({"id": 1}), json!({"id": 2})],
///     TreeOptions::default(),
/// );
/// let mut tracker = DragTracker::new();
///
/// assert!(tracker.drag_start(&engine, &NodeKey::from(1)));
/// tracker.drag_enter(&engine, &NodeKey::from(2), 0.9);
/// let intent = tracker.finish_drop(&engine).unwrap();
/// assert_eq!(intent.position, DropPosition::After);
/// ```
#[derive(Default)]
pub struct DragTracker {
    dragging: Option<NodeKey>,
    over: Option<NodeKey>,
    position: Option<DropPosition>,
}

impl DragTracker {
    /// Creates an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the node currently being dragged, if any.
    pub fn dragging_key(&self) -> Option<&NodeKey> {
        self.dragging.as_ref()
    }

    /// Key of the row currently hovered, if any.
    pub fn over_key(&self) -> Option<&NodeKey> {
        self.over.as_ref()
    }

    /// The last validated drop position, if any.
    pub fn position(&self) -> Option<DropPosition> {
        self.position
    }

    /// Begins a drag.
    ///
    /// Returns `false` (and stays idle) when the node is unknown or the
    /// `allow_drag` predicate denies it.
    pub fn drag_start(&mut self, engine: &TreeEngine, key: &NodeKey) -> bool {
        let Some(data) = engine.node_data(key) else {
            return false;
        };
        if !allow_drag(engine, &data) {
            return false;
        }
        self.dragging = Some(key.clone());
        self.over = None;
        self.position = None;
        true
    }

    /// The pointer entered a target row at the given relative offset.
    pub fn drag_enter(&mut self, engine: &TreeEngine, target: &NodeKey, offset: f32) {
        let Some(dragging_key) = self.dragging.clone() else {
            return;
        };
        let Some(dragging_data) = engine.node_data(&dragging_key) else {
            return;
        };
        let Some(target_data) = engine.node_data(target) else {
            return;
        };
        self.over = Some(target.clone());
        let position = classify_offset(offset);
        self.position = allow_drop(
            engine,
            &dragging_key,
            &dragging_data,
            target,
            &target_data,
            position,
        )
        .then_some(position);
    }

    /// The pointer moved within the hovered row.
    pub fn drag_over(&mut self, engine: &TreeEngine, target: &NodeKey, offset: f32) {
        let Some(dragging_key) = self.dragging.clone() else {
            return;
        };
        if self.over.as_ref() != Some(target) {
            return;
        }
        let Some(dragging_data) = engine.node_data(&dragging_key) else {
            return;
        };
        let Some(target_data) = engine.node_data(target) else {
            return;
        };
        let position = classify_offset(offset);
        self.position = allow_drop(
            engine,
            &dragging_key,
            &dragging_data,
            target,
            &target_data,
            position,
        )
        .then_some(position);
    }

    /// The pointer left a row. Clears the hover state if it was this row.
    pub fn drag_leave(&mut self, target: &NodeKey) {
        if self.over.as_ref() == Some(target) {
            self.over = None;
            self.position = None;
        }
    }

    /// The gesture ended without a drop.
    pub fn drag_end(&mut self) {
        self.dragging = None;
        self.over = None;
        self.position = None;
    }

    /// Completes the gesture.
    ///
    /// Returns the drop intent when a dragged node, a hovered target, and a
    /// validated position are all present and the permission predicate still
    /// agrees; otherwise returns `None`. Either way the tracker goes idle.
    pub fn finish_drop(&mut self, engine: &TreeEngine) -> Option<DropIntent> {
        let result = (|| {
            let dragging_key = self.dragging.as_ref()?;
            let target_key = self.over.as_ref()?;
            let position = self.position?;
            let dragging = engine.node_data(dragging_key)?;
            let target = engine.node_data(target_key)?;
            if !allow_drop(engine, dragging_key, &dragging, target_key, &target, position) {
                return None;
            }
            Some(DropIntent {
                dragging,
                target,
                position,
            })
        })();
        self.drag_end();
        result
    }
}

fn allow_drag(engine: &TreeEngine, dragging: &Value) -> bool {
    match &engine.options().allow_drag {
        Some(predicate) => predicate(dragging),
        None => true,
    }
}

/// Default rule: everything is allowed except dropping a node inside its own
/// subtree, which would create a cycle. Checked by reachability from the
/// dragged node down through the children links.
fn allow_drop(
    engine: &TreeEngine,
    dragging_key: &NodeKey,
    dragging: &Value,
    target_key: &NodeKey,
    target: &Value,
    position: DropPosition,
) -> bool {
    match &engine.options().allow_drop {
        Some(predicate) => predicate(dragging, target, position),
        None => {
            position != DropPosition::Inside || !engine.is_descendant(dragging_key, target_key)
        }
    }
}
