use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::domain::{LifecycleStatus, TransferFilter};
use crate::services::TransactionOrchestrator;

/// Runs the background reconciliation loop. Refreshes every transfer that is
/// still `processing`, using the same operation as the on-demand endpoint.
pub async fn run_reconciler(orchestrator: TransactionOrchestrator, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Transfer reconciler started");

    loop {
        match reconcile_batch(&orchestrator).await {
            Ok(0) => {}
            Ok(settled) => info!(settled, "Reconciler settled transfers"),
            Err(e) => error!("Reconciler batch error: {}", e),
        }

        sleep(interval).await;
    }
}

/// Returns how many transfers left `processing` during this pass.
pub async fn reconcile_batch(orchestrator: &TransactionOrchestrator) -> anyhow::Result<usize> {
    let in_flight = orchestrator
        .list(&TransferFilter::with_status(LifecycleStatus::Processing))
        .await?;

    if in_flight.is_empty() {
        return Ok(0);
    }

    debug!("Reconciling {} processing transfer(s)", in_flight.len());

    let mut settled = 0;
    for transfer in in_flight {
        match orchestrator.refresh_status(transfer.id).await {
            Ok(updated) if updated.lifecycle_status != LifecycleStatus::Processing => settled += 1,
            Ok(_) => {}
            Err(e) => warn!(transfer_id = %transfer.id, error = %e, "refresh failed"),
        }
    }

    Ok(settled)
}
