//! Canopy - a flat-tree state engine for virtualized hierarchical views.
//!
//! Canopy converts an arbitrarily deep, arbitrarily large nested dataset
//! into a flat, indexable representation and keeps a small visible window
//! over it in sync across expand/collapse, tri-state selection, filtering,
//! and lazy structural mutation — without re-deriving the whole tree.
//!
//! # Core Types
//!
//! - [`TreeEngine`]: owns the full flat list, the id index, and the visible
//!   window; exposes every data operation
//! - [`FlatNode`] / [`NodeKey`]: the materialized node record and its identity
//! - [`TreeOptions`] / [`FieldBindings`]: behavior switches and the duck-typed
//!   field mapping for raw records
//! - [`VisibleList`]: the visible window with its `changed` signal
//! - [`DragTracker`] / [`DropIntent`]: stateless drop classification
//!
//! # Example
//!
//! ```
//! use canopy::{NodeKey, TreeEngine, TreeOptions};
//! use serde_json::json;
//!
//! let data = vec![
//!     json!({"id": 1, "label": "Fruit", "children": [
//!         {"id": 11, "label": "Apple"},
//!         {"id": 12, "label": "Pear"},
//!     ]}),
//!     json!({"id": 2, "label": "Stone"}),
//! ];
//! let mut engine = TreeEngine::new(data, TreeOptions::default());
//!
//! // A virtualization layer renders exactly the visible window.
//! engine.visible().changed.connect(|&rows| {
//!     println!("render {rows} rows");
//! });
//!
//! engine.expand(&NodeKey::from(1));
//! engine.set_checked(&NodeKey::from(11), true, None);
//!
//! // Node 1 is now indeterminate: one of two children checked.
//! assert!(engine.flat_node(&NodeKey::from(1)).unwrap().is_indeterminate);
//! ```
//!
//! # Error Handling
//!
//! The engine has no fatal error conditions. Lookups with unknown keys
//! return `None`, operations addressed at hidden or unknown nodes are silent
//! no-ops, and permission predicates block silently. Duplicate resolved ids
//! are an unchecked caller precondition: the later node overwrites the
//! earlier id-index entry.

pub mod accessor;
pub mod config;
pub mod drag;
pub mod engine;
mod filter;
mod flatten;
pub mod node;
mod selection;
pub mod visible;

pub use config::{AllowDragFn, AllowDropFn, FieldBindings, FilterFn, TreeOptions};
pub use drag::{DragTracker, DropIntent, DropPosition, classify_offset};
pub use engine::{RegenerateRequest, TreeEngine, TreeSignals};
pub use node::{FlatNode, NodeKey};
pub use visible::VisibleList;
