//! Persistence traits for the reconciliation stores
//!
//! Each region reads and trims its own change log, reads its own source
//! metadata, and writes into the shared target metadata store. All of them
//! are reached through these traits so that sagas never depend on a backend.

pub mod change_log;
pub mod document;

pub use change_log::ChangeLogStore;
pub use document::DocumentStore;
