//! Derived folder hierarchy over the flat entity collection.
//!
//! # Responsibility
//! - Answer child/descendant/ancestor queries without a persisted tree.
//! - Normalise imported or corrupted collections back into a valid forest.
//!
//! # Invariants
//! - The index never mutates the snapshot it was built from.
//! - Traversals terminate even when the parent graph contains a cycle.
//! - A folder whose parent does not resolve is treated as a root; a note
//!   whose folder does not resolve is treated as unfiled.

pub mod index;
pub mod repair;
