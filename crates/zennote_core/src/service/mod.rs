//! Core use-case services.
//!
//! # Responsibility
//! - Turn caller intents into validated snapshot edits written through the
//!   gateway.
//! - Keep storage details out of the reconciliation and CLI layers.

pub mod mutation_service;
pub mod preview;
