//! Prospect Sync service: configuration, logging, scheduling and shutdown
//! around the reconciliation engine.

pub mod config; // Configuration loading
pub mod schedule; // Cycle triggers
pub mod startup; // Logging and graceful shutdown

pub use config::{Cli, Configuration};
pub use schedule::{Scheduler, Trigger};
