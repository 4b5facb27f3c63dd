use prospect_common::{NaturalKey, SyncResult};
use prospect_persistence::ChangeLogEntry;
use tracing::{info, warn};

use super::{SagaContext, SagaOutcome};

/// Remove the target file and record for `entry`, then consume the entry.
///
/// Absence at the target counts as converged. Removal failures are logged and
/// do not block: deletion has no compensation path.
pub async fn apply_delete(ctx: &SagaContext, entry: &ChangeLogEntry) -> SyncResult<SagaOutcome> {
    let outcome = clear_target(ctx, entry.sequence, &entry.key).await?;

    ctx.source.change_log.remove_entry(entry.sequence).await?;

    info!(
        region = %ctx.region,
        sequence = entry.sequence,
        op = %entry.operation,
        well_id = %entry.key.well_id,
        document = %entry.key.document_name,
        converged = outcome == SagaOutcome::AlreadyConverged,
        "Deleted document"
    );
    Ok(outcome)
}

/// Best-effort removal of the target file and record for `key`.
///
/// Fails only when the target record cannot be read at all.
pub(super) async fn clear_target(
    ctx: &SagaContext,
    sequence: i64,
    key: &NaturalKey,
) -> SyncResult<SagaOutcome> {
    let record = match ctx.target.documents.find_document(key).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            info!(region = %ctx.region, sequence, key = %key, "No target record, nothing to remove");
            return Ok(SagaOutcome::AlreadyConverged);
        }
        Err(err) if err.is_not_found() => {
            info!(region = %ctx.region, sequence, key = %key, "No target record, nothing to remove");
            return Ok(SagaOutcome::AlreadyConverged);
        }
        Err(err) => return Err(err),
    };

    match ctx.target.translator.to_storage(&record.stored_location) {
        Ok(path) => {
            if let Err(err) = ctx.target.files.remove(&path).await {
                warn!(region = %ctx.region, sequence, path = %path, error = %err, "Failed to remove file");
            }
        }
        Err(err) => {
            warn!(
                region = %ctx.region,
                sequence,
                location = %record.stored_location,
                error = %err,
                "Cannot locate stored file, leaving it in place"
            );
        }
    }

    if let Err(err) = ctx.target.documents.delete_document(key).await {
        warn!(region = %ctx.region, sequence, key = %key, error = %err, "Failed to remove target record");
    }

    Ok(SagaOutcome::Applied)
}
