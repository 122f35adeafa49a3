use anyhow::Context;
use tokio::sync::{mpsc, watch};

use crate::application::services::dispatch::{AlertDispatcher, AlertEnvelope};
use crate::application::services::scheduler::MonitorScheduler;
use crate::domain::ports::store::GraphStore;

/// Runs the scheduler and dispatcher until Ctrl+C.
///
/// On shutdown the scheduler stops every rule worker at its next tick
/// boundary; dropping the scheduler then closes the alert channel, which
/// lets the dispatcher drain and exit on its own. SIGTERM is not handled.
///
/// # Errors
///
/// Returns an error if the shutdown signal handler cannot be installed.
pub async fn run_daemon<S: GraphStore + 'static>(
    scheduler: MonitorScheduler<S>,
    dispatcher: AlertDispatcher,
    alerts_rx: mpsc::Receiver<AlertEnvelope>,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatch_task = tokio::spawn(async move { dispatcher.run(alerts_rx).await });
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, stopping rule workers...");
    println!("\nStopping argus...");

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    let _ = dispatch_task.await;
    Ok(())
}
