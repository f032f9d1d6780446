//! In-process note table.
//!
//! # Responsibility
//! - Serve as the fallback table of every `NoteStore`.
//! - Serve as the whole store when no backend is configured.
//!
//! # Invariants
//! - Owned by one store instance; there is no process-wide table.
//! - Mutations are synchronous critical sections; the lock never spans an
//!   await point.

use crate::model::note::Note;
use crate::repo::record_table::{NoteChanges, RecordTable, RepoError, RepoResult, TableKind};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Flat in-memory note collection.
#[derive(Debug, Default)]
pub struct MemoryRecordTable {
    rows: Mutex<Vec<Note>>,
}

impl MemoryRecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all owners.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Note>> {
        // A panic inside a critical section cannot leave a half-written row:
        // every mutation is a single push/replace/remove.
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordTable for MemoryRecordTable {
    fn kind(&self) -> TableKind {
        TableKind::Memory
    }

    async fn probe(&self) -> RepoResult<()> {
        Ok(())
    }

    async fn list(&self, owner_id: &str) -> RepoResult<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .rows()
            .iter()
            .filter(|note| note.is_owned_by(owner_id))
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(notes)
    }

    async fn get(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        Ok(self
            .rows()
            .iter()
            .find(|note| note.id == id && note.is_owned_by(owner_id))
            .cloned())
    }

    async fn insert(&self, note: &Note) -> RepoResult<Note> {
        note.validate()?;
        let mut rows = self.rows();
        if rows.iter().any(|existing| existing.id == note.id) {
            return Err(RepoError::Conflict(note.id.clone()));
        }
        rows.push(note.clone());
        Ok(note.clone())
    }

    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        changes: &NoteChanges,
    ) -> RepoResult<Option<Note>> {
        let mut rows = self.rows();
        let Some(note) = rows
            .iter_mut()
            .find(|note| note.id == id && note.is_owned_by(owner_id))
        else {
            return Ok(None);
        };

        note.title = changes.title.clone();
        note.body = changes.body.clone();
        note.updated_at = note.updated_at.max(changes.updated_at);
        Ok(Some(note.clone()))
    }

    async fn delete(&self, id: &str, owner_id: &str) -> RepoResult<Option<Note>> {
        let mut rows = self.rows();
        let position = rows
            .iter()
            .position(|note| note.id == id && note.is_owned_by(owner_id));
        Ok(position.map(|index| rows.remove(index)))
    }

    async fn count(&self, owner_id: &str) -> RepoResult<u64> {
        let count = self
            .rows()
            .iter()
            .filter(|note| note.is_owned_by(owner_id))
            .count();
        Ok(count as u64)
    }
}
