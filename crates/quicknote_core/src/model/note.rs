//! Note domain model.
//!
//! # Responsibility
//! - Define the single persisted record (`Note`) shared by every table.
//! - Own input normalization for create/update (`NoteDraft`).
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `title` and `body` are never empty after trimming.
//! - `updated_at >= created_at`.
//!
//! # See also
//! - docs/architecture/storage.md

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable note identifier in text form.
pub type NoteId = String;

/// Canonical note record.
///
/// Values handed out by the store are clones; mutating one never touches
/// stored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable id assigned at creation.
    pub id: NoteId,
    /// Caller id that created the note. Scopes every read and write.
    pub owner_id: String,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Trimmed, non-empty body.
    pub body: String,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Last update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

impl Note {
    /// Builds a fresh note from validated input with a generated id.
    ///
    /// `created_at` and `updated_at` both take `stamp`.
    pub fn create(owner_id: impl Into<String>, draft: NoteDraft, stamp: i64) -> Self {
        Self {
            id: new_note_id(),
            owner_id: owner_id.into(),
            title: draft.title,
            body: draft.body,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    /// Returns whether this note belongs to `owner_id`.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Validates persisted state read back from a table.
    ///
    /// # Errors
    /// - Returns the first violated field rule.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(NoteValidationError::EmptyOwner);
        }
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        if self.body.trim().is_empty() {
            return Err(NoteValidationError::EmptyBody);
        }
        if self.updated_at < self.created_at {
            return Err(NoteValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }
}

/// Generates a new note id (uuid v4, hyphenated).
pub fn new_note_id() -> NoteId {
    Uuid::new_v4().to_string()
}

/// Validated title/body input for create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    title: String,
    body: String,
}

impl NoteDraft {
    /// Trims both fields and rejects empty results.
    ///
    /// # Errors
    /// - `EmptyTitle` when `title` is blank.
    /// - `EmptyBody` when `body` is blank.
    pub fn new(title: &str, body: &str) -> Result<Self, NoteValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(NoteValidationError::EmptyBody);
        }
        Ok(Self {
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyOwner,
    EmptyTitle,
    EmptyBody,
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyOwner => write!(f, "owner id is required"),
            Self::EmptyTitle => write!(f, "title is required"),
            Self::EmptyBody => write!(f, "body is required"),
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must not be earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for NoteValidationError {}

#[cfg(test)]
mod tests {
    use super::{Note, NoteDraft, NoteValidationError};

    #[test]
    fn create_stamps_both_timestamps_and_generates_id() {
        let draft = NoteDraft::new("title", "body").unwrap();
        let note = Note::create("u1", draft, 42);
        assert_eq!(note.created_at, 42);
        assert_eq!(note.updated_at, 42);
        assert_eq!(note.id.len(), 36);
        assert!(note.is_owned_by("u1"));
        assert!(!note.is_owned_by("u2"));
    }

    #[test]
    fn validate_rejects_time_travel() {
        let mut note = Note::create("u1", NoteDraft::new("t", "b").unwrap(), 10);
        note.updated_at = 9;
        assert!(matches!(
            note.validate(),
            Err(NoteValidationError::UpdatedBeforeCreated { .. })
        ));
    }
}
