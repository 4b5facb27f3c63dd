//! Prospect Sync - Change-log driven document reconciliation
//!
//! This crate provides the reconciliation engine:
//! - Region, target and engine settings
//! - Location resolvers (prefix substitution, token-gated gateway)
//! - Blob transfer and the target filesystem surface
//! - Change log poller, Insert/Delete/Update sagas with compensation
//! - Per-region dispatcher and the cycle orchestrator

pub mod dispatcher;
pub mod metrics;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod resolver;
pub mod saga;
pub mod settings;
pub mod source;
pub mod transfer;

pub use dispatcher::{DEAD_LETTER_TARGET, RegionDispatcher};
pub use orchestrator::Orchestrator;
pub use report::{CycleStatus, EntryOutcome, EntryResult, RegionReport};
pub use resolver::{GatewayResolver, LocationResolver, PrefixResolver, resolver_for};
pub use saga::{COMPENSATION_TARGET, SagaContext, SagaOutcome, SourceStores, TargetStores};
pub use settings::{
    EngineSettings, GatewaySettings, RegionSettings, SourceDbSettings, SyncSettings,
    TargetDbSettings, TargetSettings,
};
pub use source::{SourceConnector, SqlSourceConnector, StaticSourceConnector};
pub use transfer::{BlobSource, FileStore, HttpBlobSource, LocalFileStore, http_client};
