//! Persistence gateway contract and backends.
//!
//! # Responsibility
//! - Define the whole-collection load/save/clear contract.
//! - Provide SQLite, JSON-file and in-memory backends.
//! - Isolate storage details from mutation/reconciliation logic.
//!
//! # Invariants
//! - Backends return semantic errors (`InvalidData`, `Unavailable`) in
//!   addition to transport errors.
//! - A failed save leaves the previously saved snapshot in place.

pub mod json_repo;
pub mod memory_repo;
pub mod snapshot_repo;
pub mod sqlite_repo;
