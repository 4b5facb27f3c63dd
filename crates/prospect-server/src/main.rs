//! Main entry point for the Prospect Sync reconciliation service.
//!
//! Loads configuration, connects the target and every region, then runs
//! cycles on the configured schedule until shutdown.

use prospect_server::{Configuration, Scheduler, startup};
use prospect_sync::Orchestrator;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let logging_config = configuration.logging_config();
    let _logging_guard = startup::init_logging(&logging_config)?;

    prospect_sync::metrics::init_metrics();

    info!(profile = %configuration.profile(), "Starting Prospect Sync");

    // Configuration errors are fatal before the first cycle
    let settings = configuration.engine_settings()?;
    let trigger = configuration.trigger()?;

    let orchestrator = Orchestrator::connect(&settings).await?;
    info!(
        regions = ?orchestrator.regions().collect::<Vec<_>>(),
        trigger = ?trigger,
        "Orchestrator ready"
    );

    let shutdown = startup::wait_for_shutdown_signal();
    Scheduler::new(trigger, configuration.run_on_startup())
        .run(&orchestrator, &shutdown)
        .await;

    info!("Prospect Sync shutdown complete");
    Ok(())
}
