//! Per-entry and per-region cycle results

use std::time::Duration;

use prospect_common::{NaturalKey, SyncError};
use prospect_persistence::OperationKind;

use crate::saga::SagaOutcome;

/// Result of dispatching one change-log entry
#[derive(Debug)]
pub enum EntryResult {
    Applied,
    /// Consumed without target effects
    Converged,
    /// Left in the change log for the next cycle
    Failed(SyncError),
    /// Removed from the change log after repeated permanent failures
    DeadLettered(SyncError),
}

impl EntryResult {
    /// Label used for the `outcome` metric dimension
    pub fn label(&self) -> &'static str {
        match self {
            EntryResult::Applied => "applied",
            EntryResult::Converged => "converged",
            EntryResult::Failed(_) => "failed",
            EntryResult::DeadLettered(_) => "dead_lettered",
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            EntryResult::Failed(err) | EntryResult::DeadLettered(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SagaOutcome> for EntryResult {
    fn from(outcome: SagaOutcome) -> Self {
        match outcome {
            SagaOutcome::Applied => EntryResult::Applied,
            SagaOutcome::AlreadyConverged => EntryResult::Converged,
        }
    }
}

#[derive(Debug)]
pub struct EntryOutcome {
    pub sequence: i64,
    pub key: NaturalKey,
    pub operation: OperationKind,
    pub result: EntryResult,
}

#[derive(Debug)]
pub enum CycleStatus {
    /// Every pending entry was dispatched
    Completed,
    /// The previous cycle of this region was still running
    Skipped,
    /// The region could not start: connect, login or poll failed
    Aborted(SyncError),
    /// The cycle task panicked or was cancelled
    Crashed(String),
}

/// Summary of one region's cycle
#[derive(Debug)]
pub struct RegionReport {
    pub region: String,
    pub status: CycleStatus,
    pub entries: Vec<EntryOutcome>,
    pub elapsed: Duration,
}

impl RegionReport {
    pub fn skipped(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            status: CycleStatus::Skipped,
            entries: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn crashed(region: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            status: CycleStatus::Crashed(reason.into()),
            entries: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn count(&self, f: impl Fn(&EntryResult) -> bool) -> usize {
        self.entries.iter().filter(|e| f(&e.result)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Applied))
    }

    pub fn converged(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Converged))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Failed(_)))
    }

    pub fn dead_lettered(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::DeadLettered(_)))
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, CycleStatus::Completed)
    }

    /// Outcome recorded for a sequence in this cycle
    pub fn outcome(&self, sequence: i64) -> Option<&EntryOutcome> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(sequence: i64, result: EntryResult) -> EntryOutcome {
        EntryOutcome {
            sequence,
            key: NaturalKey::new("U1", "W100", "a.pdf"),
            operation: OperationKind::Insert,
            result,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = RegionReport {
            region: "east".to_string(),
            status: CycleStatus::Completed,
            entries: vec![
                outcome(1, EntryResult::Applied),
                outcome(2, EntryResult::Converged),
                outcome(3, EntryResult::Failed(SyncError::connectivity("down"))),
                outcome(4, EntryResult::Applied),
                outcome(5, EntryResult::DeadLettered(SyncError::not_found("gone"))),
            ],
            elapsed: Duration::from_millis(10),
        };

        assert!(report.is_completed());
        assert_eq!(report.applied(), 2);
        assert_eq!(report.converged(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.dead_lettered(), 1);
        assert_eq!(report.outcome(3).map(|o| o.result.label()), Some("failed"));
        assert!(matches!(
            report.outcome(5).and_then(|o| o.result.error()),
            Some(SyncError::NotFound(_))
        ));
        assert!(report.outcome(1).and_then(|o| o.result.error()).is_none());
        assert!(report.outcome(9).is_none());
    }

    #[test]
    fn test_skipped_report() {
        let report = RegionReport::skipped("xj");
        assert!(!report.is_completed());
        assert!(report.entries.is_empty());
    }
}
