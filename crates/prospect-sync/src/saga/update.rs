use prospect_common::SyncResult;
use prospect_persistence::ChangeLogEntry;
use tracing::debug;

use super::delete::clear_target;
use super::insert::apply_insert;
use super::{SagaContext, SagaOutcome};

/// Clear whatever the target holds for the key, then insert afresh.
///
/// Converges whether the target has the old version, nothing, or the residue
/// of a partially applied earlier attempt.
pub async fn apply_update(ctx: &SagaContext, entry: &ChangeLogEntry) -> SyncResult<SagaOutcome> {
    let cleared = clear_target(ctx, entry.sequence, &entry.key).await?;
    debug!(
        region = %ctx.region,
        sequence = entry.sequence,
        had_previous = cleared == SagaOutcome::Applied,
        "Cleared previous version"
    );

    apply_insert(ctx, entry).await
}
