//! Prospect Common - Shared types and pure utilities
//!
//! This crate provides the foundational pieces used across all prospect-sync components:
//! - Error taxonomy shared by the persistence and reconciliation layers
//! - The natural key identifying one document across every store
//! - Location translation between storage paths and published paths

pub mod error;
pub mod key;
pub mod location;

// Re-exports for convenience
pub use error::{SyncError, SyncResult};
pub use key::NaturalKey;
pub use location::{PathTranslator, StorageLayout, base_name, strip_anchored};

/// Default naming prefix prepended to a region name to namespace its files
pub const DEFAULT_NAMING_PREFIX: &str = "cnpc_";

/// Number of leading well-id characters used as the bucket directory
pub const WELL_BUCKET_CHARS: usize = 3;
