//! Note search over the caller-visible collection.
//!
//! # Responsibility
//! - Match notes by case-insensitive substring on title or visible text.
//! - Keep result shaping inside core.
//!
//! # Invariants
//! - Blank queries return no hits.
//! - Hits follow collection order.

use crate::model::id::NoteId;
use crate::model::note::Note;
use crate::model::snapshot::Snapshot;
use crate::service::preview::{derive_text_preview, plain_text};

/// Search options.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// User query text.
    pub text: String,
    /// Maximum number of hits to return.
    pub limit: usize,
}

impl SearchQuery {
    /// Creates a query with the default page size.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 20,
        }
    }
}

/// Single hit returned by [`search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub note_id: NoteId,
    pub title: String,
    pub snippet: Option<String>,
}

/// Notes whose title or content contains `term`, ignoring case.
///
/// Content is matched on its visible text, so markup never produces hits.
pub fn search_notes<'a>(snapshot: &'a Snapshot, term: &str) -> Vec<&'a Note> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    snapshot
        .notes
        .iter()
        .filter(|note| {
            note.title.to_lowercase().contains(&needle)
                || plain_text(&note.content).to_lowercase().contains(&needle)
        })
        .collect()
}

/// Runs `query` and shapes the first `limit` matches into hits.
pub fn search(snapshot: &Snapshot, query: &SearchQuery) -> Vec<SearchHit> {
    if query.limit == 0 {
        return Vec::new();
    }
    search_notes(snapshot, &query.text)
        .into_iter()
        .take(query.limit)
        .map(|note| SearchHit {
            note_id: note.id,
            title: note.title.clone(),
            snippet: derive_text_preview(&note.content),
        })
        .collect()
}
