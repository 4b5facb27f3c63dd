//! Reconciliation sagas
//!
//! Each saga applies one change-log entry to the target file and metadata
//! stores. There is no transaction spanning the stores: a failed forward step
//! runs the compensations for the steps that already succeeded, and the
//! change-log entry is removed only after every target effect is durable.

mod delete;
mod insert;
mod update;

pub use delete::apply_delete;
pub use insert::apply_insert;
pub use update::apply_update;

use std::sync::Arc;

use prospect_common::{PathTranslator, StorageLayout, SyncError};
use prospect_persistence::{ChangeLogEntry, ChangeLogStore, DocumentStore};
use tracing::{error, warn};

use crate::metrics;
use crate::resolver::LocationResolver;
use crate::transfer::{BlobSource, FileStore};

/// Target used for compensation failures, routed to their own log file
pub const COMPENSATION_TARGET: &str = "prospect_sync::compensation";

/// Stores of one region's source database
#[derive(Clone)]
pub struct SourceStores {
    pub change_log: Arc<dyn ChangeLogStore>,
    pub documents: Arc<dyn DocumentStore>,
}

/// Target stores shared by every region
#[derive(Clone)]
pub struct TargetStores {
    pub documents: Arc<dyn DocumentStore>,
    pub files: Arc<dyn FileStore>,
    pub translator: PathTranslator,
    pub layout: StorageLayout,
}

/// Everything a saga touches for one region
#[derive(Clone)]
pub struct SagaContext {
    pub region: String,
    pub source: SourceStores,
    pub target: TargetStores,
    pub resolver: Arc<dyn LocationResolver>,
    pub blobs: Arc<dyn BlobSource>,
}

/// How a successfully applied entry left the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaOutcome {
    /// Target effects were performed
    Applied,
    /// Nothing to do at the target; the entry was still consumed
    AlreadyConverged,
}

/// Undo steps of a failed insert, in reverse order of the forward steps
enum Undo<'a> {
    RemoveRow,
    RemoveFile(&'a str),
}

/// Run `undo` after forward step failure `cause`.
///
/// Returns `cause` when every undo step succeeded; otherwise the residue is
/// reported loudly and a `CompensationFailure` is returned instead.
async fn compensate(
    ctx: &SagaContext,
    entry: &ChangeLogEntry,
    undo: &[Undo<'_>],
    cause: SyncError,
) -> SyncError {
    let mut residue = Vec::new();

    for step in undo {
        match step {
            Undo::RemoveRow => {
                if let Err(e) = ctx.target.documents.delete_document(&entry.key).await {
                    residue.push(format!("target row {}: {}", entry.key, e));
                }
            }
            Undo::RemoveFile(path) => {
                if let Err(e) = ctx.target.files.remove(path).await {
                    residue.push(format!("file {}: {}", path, e));
                }
            }
        }
    }

    if residue.is_empty() {
        warn!(
            region = %ctx.region,
            sequence = entry.sequence,
            op = %entry.operation,
            error = %cause,
            "Rolled back partially applied entry"
        );
        return cause;
    }

    let residue = residue.join("; ");
    error!(
        target: COMPENSATION_TARGET,
        region = %ctx.region,
        sequence = entry.sequence,
        op = %entry.operation,
        owner_unit = %entry.key.owner_unit,
        well_id = %entry.key.well_id,
        document = %entry.key.document_name,
        error = %cause,
        residue = %residue,
        "Compensation failed, residue requires operator remediation"
    );
    metrics::record_compensation_failure(&ctx.region);

    SyncError::CompensationFailure(format!("{} (residue: {})", cause, residue))
}
