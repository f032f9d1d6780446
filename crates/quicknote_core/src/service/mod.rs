//! Note store orchestration.
//!
//! # Responsibility
//! - Route note use-cases to the backend table or the fallback table.
//! - Keep routing layers decoupled from storage details.
//!
//! # See also
//! - docs/architecture/storage.md

pub mod clock;
pub mod note_store;
pub mod status;
