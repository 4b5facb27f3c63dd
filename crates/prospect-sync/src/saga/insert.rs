use prospect_common::{SyncError, SyncResult};
use prospect_persistence::ChangeLogEntry;
use tracing::{debug, info, warn};

use super::{SagaContext, SagaOutcome, Undo, compensate};

/// Materialize the source document for `entry` at the target.
///
/// The storage path is a pure function of the key, so a retry after any abort
/// overwrites the same file, and an existing target row is superseded before
/// the new one is inserted.
pub async fn apply_insert(ctx: &SagaContext, entry: &ChangeLogEntry) -> SyncResult<SagaOutcome> {
    let key = &entry.key;

    let record = ctx
        .source
        .documents
        .find_document(key)
        .await?
        .ok_or_else(|| SyncError::not_found(format!("source record {}", key)))?;

    let url = ctx.resolver.resolve(&record.stored_location).await?;

    let storage_path =
        ctx.target
            .layout
            .storage_path(&ctx.region, &key.well_id, &record.stored_location)?;
    let published = ctx.target.translator.to_published(&storage_path)?;

    let contents = match ctx.blobs.fetch(&url).await {
        Ok(contents) => contents,
        Err(err @ SyncError::Unauthorized(_)) => {
            ctx.resolver.invalidate();
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    ctx.target.files.write(&storage_path, contents).await?;
    debug!(region = %ctx.region, sequence = entry.sequence, path = %storage_path, "Downloaded file");

    if let Some(previous) = ctx.target.documents.find_document(key).await? {
        let superseded = ctx.target.documents.delete_document(key).await?;
        debug!(
            region = %ctx.region,
            sequence = entry.sequence,
            rows = superseded,
            "Superseded existing target record"
        );
        remove_superseded_file(ctx, entry, &previous.stored_location, &storage_path).await;
    }

    if let Err(err) = ctx
        .target
        .documents
        .insert_document(&record.relocated(published.as_str()))
        .await
    {
        return Err(compensate(ctx, entry, &[Undo::RemoveFile(&storage_path)], err).await);
    }

    if let Err(err) = ctx.source.change_log.remove_entry(entry.sequence).await {
        return Err(compensate(
            ctx,
            entry,
            &[Undo::RemoveRow, Undo::RemoveFile(&storage_path)],
            err,
        )
        .await);
    }

    info!(
        region = %ctx.region,
        sequence = entry.sequence,
        op = %entry.operation,
        well_id = %key.well_id,
        document = %key.document_name,
        published = %published,
        "Inserted document"
    );
    Ok(SagaOutcome::Applied)
}

/// Best-effort removal of the file a superseded record pointed at, unless the
/// new version was just written over it.
async fn remove_superseded_file(
    ctx: &SagaContext,
    entry: &ChangeLogEntry,
    previous_location: &str,
    storage_path: &str,
) {
    match ctx.target.translator.to_storage(previous_location) {
        Ok(old_path) if old_path == storage_path => {}
        Ok(old_path) => {
            if let Err(err) = ctx.target.files.remove(&old_path).await {
                warn!(
                    region = %ctx.region,
                    sequence = entry.sequence,
                    path = %old_path,
                    error = %err,
                    "Failed to remove superseded file"
                );
            }
        }
        Err(err) => {
            warn!(
                region = %ctx.region,
                sequence = entry.sequence,
                location = %previous_location,
                error = %err,
                "Cannot locate superseded file, leaving it in place"
            );
        }
    }
}
