//! Core storage layer for QuickNote.
//! This crate is the single source of truth for note invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{BackendConfig, ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::note::{Note, NoteDraft, NoteId, NoteValidationError};
pub use repo::memory_table::MemoryRecordTable;
pub use repo::record_table::{NoteChanges, RecordTable, RepoError, RepoResult, TableKind};
pub use repo::rest_table::{RestRecordTable, RestTableConfig};
pub use repo::sqlite_table::SqliteRecordTable;
pub use service::note_store::{ErrorKind, NoteStore, StoreError, StoreResult};
pub use service::status::{ConnectionStatus, StorageKind, StoreHealth, StoreState};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
