//! Reconciliation layer between callers and the mutation service.
//!
//! # Responsibility
//! - Keep the caller-visible collection in step with successful writes.
//! - Coalesce high-frequency note edits into debounced autosave writes.

pub mod autosave;
pub mod reconciler;
pub mod store;
