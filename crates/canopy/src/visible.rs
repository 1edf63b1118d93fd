//! The visible window.
//!
//! [`VisibleList`] is the ordered subsequence of flattened nodes whose
//! ancestors are all expanded — the only portion a virtualization layer needs
//! to render. Each engine owns exactly one (plus a temporary one while a
//! filter is active); there is no shared or ambient list. Mutations are
//! announced through the [`changed`](VisibleList::changed) signal, which the
//! engine fires once per operation after positions have been renumbered.

use canopy_core::Signal;

use crate::node::NodeKey;

/// An engine-owned visible window over the flattened tree.
pub struct VisibleList {
    keys: Vec<NodeKey>,
    /// Emitted after any mutating operation settles, carrying the new row
    /// count. Dispatch is synchronous.
    pub changed: Signal<usize>,
}

impl Default for VisibleList {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibleList {
    /// Creates an empty visible window.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            changed: Signal::new(),
        }
    }

    /// The visible keys, in row order.
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no rows are visible.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key at a row position.
    pub fn get(&self, row: usize) -> Option<&NodeKey> {
        self.keys.get(row)
    }

    /// Replaces the entire window.
    pub(crate) fn replace(&mut self, keys: Vec<NodeKey>) {
        self.keys = keys;
    }

    /// Splices a contiguous run in at `at` (clamped to the current length).
    pub(crate) fn insert_run(&mut self, at: usize, run: Vec<NodeKey>) {
        let at = at.min(self.keys.len());
        self.keys.splice(at..at, run);
    }

    /// Removes a contiguous run of `len` rows starting at `at`, returning the
    /// removed keys. Out-of-range spans are clamped.
    pub(crate) fn remove_run(&mut self, at: usize, len: usize) -> Vec<NodeKey> {
        let at = at.min(self.keys.len());
        let end = (at + len).min(self.keys.len());
        self.keys.drain(at..end).collect()
    }

    /// Announces the current state to listeners.
    pub(crate) fn notify(&self) {
        self.changed.emit(self.keys.len());
    }
}
