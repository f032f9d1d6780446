//! Note domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the store and every table.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Deletion is permanent; there are no tombstones.
//!
//! # See also
//! - docs/architecture/storage.md

pub mod note;
