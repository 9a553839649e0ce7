//! Folder domain model.
//!
//! # Responsibility
//! - Define the grouping record of the workspace hierarchy.
//! - Produce new folder versions for rename/toggle/move edits.
//!
//! # Invariants
//! - `id` is stable and never reused for another folder.
//! - `name` is trimmed and non-blank once constructed.
//! - `parent_id = None` means root level.

use crate::model::id::FolderId;
use crate::model::normalize_display_name;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Name given to folders created without a usable name.
pub const DEFAULT_FOLDER_NAME: &str = "New Folder";

/// Grouping node that can contain child folders and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    /// User-facing label.
    pub name: String,
    /// Parent folder id. `None` means root-level folder.
    #[serde(default)]
    pub parent_id: Option<FolderId>,
    /// UI expansion state. Persisted so the tree reopens as it was left.
    #[serde(default)]
    pub is_open: bool,
}

impl Folder {
    /// Creates an open folder with a freshly minted id.
    ///
    /// A blank `name` falls back to [`DEFAULT_FOLDER_NAME`].
    pub fn new(name: &str, parent_id: Option<FolderId>) -> Self {
        Self::with_id(FolderId::new(), name, parent_id)
    }

    /// Creates an open folder with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: FolderId, name: &str, parent_id: Option<FolderId>) -> Self {
        Self {
            id,
            name: normalize_display_name(name).unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string()),
            parent_id,
            is_open: true,
        }
    }

    /// Returns a renamed version, or `None` when `name` is blank.
    pub fn renamed(&self, name: &str) -> Option<Self> {
        let name = normalize_display_name(name)?;
        Some(Self {
            name,
            ..self.clone()
        })
    }

    pub fn with_open(&self, is_open: bool) -> Self {
        Self {
            is_open,
            ..self.clone()
        }
    }

    pub fn with_parent(&self, parent_id: Option<FolderId>) -> Self {
        Self {
            parent_id,
            ..self.clone()
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Folder {}

impl Hash for Folder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
