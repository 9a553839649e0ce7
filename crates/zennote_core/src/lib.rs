//! Core domain logic for ZenNote.
//! This crate is the single source of truth for hierarchy invariants,
//! mutation semantics and autosave reconciliation.

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod sync;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use hierarchy::index::HierarchyIndex;
pub use hierarchy::repair::{repair, RepairReport};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::folder::{Folder, DEFAULT_FOLDER_NAME};
pub use model::id::{FolderId, IdParseError, NoteId};
pub use model::note::{Note, DEFAULT_NOTE_TITLE};
pub use model::snapshot::Snapshot;
pub use repo::json_repo::JsonFileSnapshotRepository;
pub use repo::memory_repo::MemorySnapshotRepository;
pub use repo::snapshot_repo::{RepoError, RepoResult, SnapshotRepository};
pub use repo::sqlite_repo::SqliteSnapshotRepository;
pub use search::{search, search_notes, SearchHit, SearchQuery};
pub use service::mutation_service::{
    Change, MutationError, MutationOutcome, MutationResult, MutationService, NoteDraft,
};
pub use service::preview::{derive_content_preview, derive_text_preview, ContentPreview};
pub use sync::autosave::SaveStatus;
pub use sync::reconciler::Reconciler;
pub use sync::store::{NoteStore, RemovedTree, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
