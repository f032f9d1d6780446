//! Repository layer: the note table seam and its implementations.
//!
//! # Responsibility
//! - Define the owner-scoped `RecordTable` contract.
//! - Isolate SQL and HTTP details from store orchestration.
//!
//! # Invariants
//! - Table writes must enforce `Note::validate()` before persistence.
//! - Tables report absence as `Ok(None)`, distinct from transport errors.
//!
//! # See also
//! - docs/architecture/storage.md

pub mod memory_table;
pub mod record_table;
pub mod rest_table;
pub mod sqlite_table;
