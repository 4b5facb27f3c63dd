//! Region dispatcher and orchestrator behaviour

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Harness, entry, set};
use prospect_common::{SyncError, SyncResult};
use prospect_persistence::OperationKind;
use prospect_sync::{
    CycleStatus, EntryResult, Orchestrator, RegionDispatcher, SourceConnector, SourceStores,
};
use tokio::sync::Notify;

/// Connector that holds the cycle until released
struct GatedConnector {
    stores: SourceStores,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SourceConnector for GatedConnector {
    async fn connect(&self) -> SyncResult<SourceStores> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.stores.clone())
    }
}

fn gated(h: &Harness) -> (Arc<GatedConnector>, RegionDispatcher) {
    let connector = Arc::new(GatedConnector {
        stores: h.source_stores(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let dispatcher = RegionDispatcher::new(
        "gated",
        connector.clone(),
        h.resolver.clone(),
        h.blobs.clone(),
        h.target_stores(),
    );
    (connector, dispatcher)
}

#[tokio::test]
async fn test_insert_then_delete_leaves_nothing() {
    let h = Harness::new();
    h.with_source_document("report.pdf", b"bytes").await;
    h.log(entry(1, "report.pdf", OperationKind::Insert));
    h.log(entry(2, "report.pdf", OperationKind::Delete));

    let report = h.dispatcher().run_cycle().await;

    assert!(report.is_completed());
    assert_eq!(report.applied(), 2);
    assert!(h.file_contents("report.pdf").is_none());
    assert_eq!(h.target_rows("report.pdf"), 0);
    assert!(h.source_log.inner.is_empty());
}

#[tokio::test]
async fn test_entries_dispatched_in_sequence_order() {
    let h = Harness::new();
    h.with_source_document("a.pdf", b"a").await;
    h.with_source_document("b.pdf", b"b").await;
    h.log(entry(30, "b.pdf", OperationKind::Insert));
    h.log(entry(10, "a.pdf", OperationKind::Insert));
    h.log(entry(20, "a.pdf", OperationKind::Delete));

    let report = h.dispatcher().run_cycle().await;

    let sequences: Vec<i64> = report.entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![10, 20, 30]);
    assert_eq!(h.target_rows("a.pdf"), 0);
    assert_eq!(h.target_rows("b.pdf"), 1);
}

#[tokio::test]
async fn test_failed_entry_does_not_stop_the_queue() {
    let h = Harness::new();
    h.with_source_document("b.pdf", b"b").await;
    h.log(entry(1, "missing.pdf", OperationKind::Insert));
    h.log(entry(2, "b.pdf", OperationKind::Insert));

    let report = h.dispatcher().run_cycle().await;

    assert!(report.is_completed());
    assert!(matches!(
        report.outcome(1).map(|o| &o.result),
        Some(EntryResult::Failed(SyncError::NotFound(_)))
    ));
    assert!(matches!(
        report.outcome(2).map(|o| &o.result),
        Some(EntryResult::Applied)
    ));
    assert!(h.source_log.inner.contains(1));
    assert!(!h.source_log.inner.contains(2));
}

#[tokio::test]
async fn test_unknown_operation_is_retained() {
    let h = Harness::new();
    h.log(entry(1, "a.pdf", OperationKind::Unknown("X".to_string())));

    let report = h.dispatcher().run_cycle().await;

    assert!(matches!(
        report.outcome(1).map(|o| &o.result),
        Some(EntryResult::Failed(SyncError::UnknownOperation(code))) if code == "X"
    ));
    assert!(h.source_log.inner.contains(1));
}

#[tokio::test]
async fn test_permanent_failure_dead_lettered_after_threshold() {
    let h = Harness::new();
    h.log(entry(1, "a.pdf", OperationKind::Unknown("X".to_string())));
    let dispatcher = h.dispatcher().with_dead_letter_after(3);

    for _ in 0..2 {
        let report = dispatcher.run_cycle().await;
        assert_eq!(report.failed(), 1);
        assert!(h.source_log.inner.contains(1));
    }

    let report = dispatcher.run_cycle().await;
    assert_eq!(report.dead_lettered(), 1);
    assert!(!h.source_log.inner.contains(1));
}

#[tokio::test]
async fn test_dead_letter_disabled_retains_forever() {
    let h = Harness::new();
    h.log(entry(1, "missing.pdf", OperationKind::Insert));
    let dispatcher = h.dispatcher().with_dead_letter_after(0);

    for _ in 0..4 {
        assert_eq!(dispatcher.run_cycle().await.failed(), 1);
    }
    assert!(h.source_log.inner.contains(1));
}

#[tokio::test]
async fn test_transient_failure_never_dead_lettered() {
    let h = Harness::new();
    h.with_source_document("a.pdf", b"a").await;
    h.log(entry(1, "a.pdf", OperationKind::Insert));
    set(&h.blobs.unauthorized, true);
    let dispatcher = h.dispatcher().with_dead_letter_after(1);

    for _ in 0..3 {
        assert_eq!(dispatcher.run_cycle().await.failed(), 1);
    }
    assert!(h.source_log.inner.contains(1));

    set(&h.blobs.unauthorized, false);
    assert_eq!(dispatcher.run_cycle().await.applied(), 1);
    assert!(h.source_log.inner.is_empty());
}

#[tokio::test]
async fn test_poll_failure_aborts_region_cycle() {
    let h = Harness::new();
    h.log(entry(1, "a.pdf", OperationKind::Insert));
    set(&h.source_log.fail_poll, true);

    let report = h.dispatcher().run_cycle().await;

    assert!(matches!(
        report.status,
        CycleStatus::Aborted(SyncError::Connectivity(_))
    ));
    assert!(report.entries.is_empty());
    assert!(h.source_log.inner.contains(1));
}

#[tokio::test]
async fn test_overlapping_trigger_is_skipped() {
    let h = Harness::new();
    let (connector, dispatcher) = gated(&h);
    let dispatcher = Arc::new(dispatcher);

    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run_cycle().await }
    });
    connector.entered.notified().await;

    let second = dispatcher.run_cycle().await;
    assert!(matches!(second.status, CycleStatus::Skipped));

    connector.release.notify_one();
    let first = first.await.unwrap();
    assert!(first.is_completed());
}

#[tokio::test]
async fn test_orchestrator_isolates_region_failures() {
    let healthy = Harness::new();
    healthy.with_source_document("a.pdf", b"a").await;
    healthy.log(entry(1, "a.pdf", OperationKind::Insert));

    let broken = Harness::new();
    broken.log(entry(1, "b.pdf", OperationKind::Insert));
    set(&broken.source_log.fail_poll, true);

    let orchestrator = Orchestrator::new(vec![healthy.dispatcher(), broken.dispatcher()]);
    let reports = orchestrator.run_cycle().await;

    assert_eq!(reports.len(), 2);
    assert!(reports[0].is_completed());
    assert_eq!(reports[0].applied(), 1);
    assert!(matches!(reports[1].status, CycleStatus::Aborted(_)));
    assert!(healthy.source_log.inner.is_empty());
}

#[tokio::test]
async fn test_stalled_region_does_not_block_others() {
    let stalled = Harness::new();
    let (connector, stalled_dispatcher) = gated(&stalled);

    let healthy = Harness::new();
    healthy.with_source_document("a.pdf", b"a").await;
    healthy.log(entry(1, "a.pdf", OperationKind::Insert));

    let orchestrator = Orchestrator::new(vec![stalled_dispatcher, healthy.dispatcher()]);
    orchestrator.trigger().await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while !healthy.source_log.inner.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("healthy region drained while the other is stalled");

    connector.release.notify_one();
    orchestrator.wait_idle().await;
    assert_eq!(healthy.target_rows("a.pdf"), 1);
}
