//! Persistence gateway contract for the folder/note collection.
//!
//! # Responsibility
//! - Define the async load/save/clear contract every durable backend obeys.
//! - Own the error taxonomy for persistence failures.
//!
//! # Invariants
//! - `save` is all-or-nothing: after a failed save the previously saved
//!   snapshot is still what `load` returns.
//! - One repository instance addresses exactly one `store_key`.
//! - Implementations never retry internally; a failure is terminal for
//!   that call.

use crate::db::DbError;
use crate::model::snapshot::Snapshot;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from persistence gateway operations.
#[derive(Debug)]
pub enum RepoError {
    /// SQLite bootstrap/query failure.
    Db(DbError),
    /// File system failure.
    Io(std::io::Error),
    /// Snapshot (de)serialization failure.
    Serde(serde_json::Error),
    /// Persisted data cannot be converted into valid entities.
    InvalidData(String),
    /// Backend refused or could not serve the request.
    Unavailable(String),
    /// Blocking worker running the request died before answering.
    TaskJoin(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "snapshot io failed: {err}"),
            Self::Serde(err) => write!(f, "snapshot serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
            Self::Unavailable(message) => write!(f, "persistence unavailable: {message}"),
            Self::TaskJoin(message) => write!(f, "persistence worker failed: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) | Self::TaskJoin(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Durable get/put/delete of the whole folder + note collection.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Key addressing this collection inside the backend.
    fn store_key(&self) -> &str;
    /// Loads the whole collection. A never-saved store loads as empty.
    async fn load(&self) -> RepoResult<Snapshot>;
    /// Replaces the whole collection atomically.
    async fn save(&self, snapshot: &Snapshot) -> RepoResult<()>;
    /// Removes the collection from the backend.
    async fn clear(&self) -> RepoResult<()>;
}

/// Trims a store key and rejects values unusable as a backend key.
pub fn normalize_store_key(value: &str) -> RepoResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidData(
            "store key must not be blank".to_string(),
        ));
    }
    if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(RepoError::InvalidData(format!(
            "store key `{trimmed}` must not contain path separators"
        )));
    }
    Ok(trimmed.to_string())
}
