// Metrics for reconciliation cycles
// Recorded through the `metrics` facade; the embedding binary decides on an exporter

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const ENTRIES_TOTAL: &str = "sync_entries_total";
pub const COMPENSATION_FAILURES_TOTAL: &str = "sync_compensation_failures_total";
pub const DEAD_LETTERS_TOTAL: &str = "sync_dead_letters_total";
pub const CYCLE_DURATION_SECONDS: &str = "sync_cycle_duration_seconds";

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        ENTRIES_TOTAL,
        "Change-log entries processed, by region, operation and outcome"
    );
    describe_counter!(
        COMPENSATION_FAILURES_TOTAL,
        "Rollbacks that left residue at the target"
    );
    describe_counter!(
        DEAD_LETTERS_TOTAL,
        "Change-log entries dropped after repeated permanent failures"
    );
    describe_histogram!(
        CYCLE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Duration of one region's reconciliation cycle"
    );

    tracing::info!("Metrics initialized");
}

/// Record one processed change-log entry
pub fn record_entry(region: &str, op: &'static str, outcome: &'static str) {
    counter!(
        ENTRIES_TOTAL,
        "region" => region.to_string(),
        "op" => op,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a rollback that left residue
pub fn record_compensation_failure(region: &str) {
    counter!(COMPENSATION_FAILURES_TOTAL, "region" => region.to_string()).increment(1);
}

/// Record a dead-lettered entry
pub fn record_dead_letter(region: &str) {
    counter!(DEAD_LETTERS_TOTAL, "region" => region.to_string()).increment(1);
}

/// Record a finished region cycle
pub fn record_cycle_duration(region: &str, elapsed: Duration) {
    histogram!(CYCLE_DURATION_SECONDS, "region" => region.to_string())
        .record(elapsed.as_secs_f64());
}
