//! Core systems for Canopy.
//!
//! This crate provides the foundational pieces shared by the Canopy tree
//! engine:
//!
//! - **Signal/Slot System**: Type-safe change notification, used by the
//!   engine to tell collaborators (a virtualization layer, a view) that the
//!   visible window or selection state changed.
//!
//! Dispatch is synchronous and direct: Canopy's execution model is
//! single-threaded and cooperative, so a slot always runs to completion on
//! the emitting thread before `emit` returns. The types are still `Send +
//! Sync` so engines can be shared behind a lock if an application wants to.
//!
//! # Signal/Slot Example
//!
//! ```
//! use canopy_core::Signal;
//!
//! // Create a signal that notifies when the visible row count changes
//! let rows_changed = Signal::<usize>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = rows_changed.connect(|count| {
//!     println!("Visible rows: {}", count);
//! });
//!
//! // Emit the signal
//! rows_changed.emit(42);
//!
//! // Disconnect when done
//! rows_changed.disconnect(conn_id);
//! ```

pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
