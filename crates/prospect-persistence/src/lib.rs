//! Prospect Persistence - Change-log and document metadata stores
//!
//! This crate provides:
//! - Domain row types shared by every backend
//! - Persistence trait abstractions consumed by the reconciliation sagas
//! - A SQL backend (MySQL/PostgreSQL via SeaORM) with configurable relation names
//! - An in-memory backend

pub mod memory;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

pub use traits::{ChangeLogStore, DocumentStore};

pub use memory::{MemoryChangeLog, MemoryDocumentStore};
pub use sql::{PoolSettings, SqlChangeLog, SqlDocumentStore, connect};

pub use model::{ChangeLogEntry, DocumentRecord, OperationKind};
