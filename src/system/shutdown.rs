use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::deletion::{DeletionCoordinator, ShutdownReport};
use crate::errors::{Result, ShortenerError};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C
pub async fn wait_for_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping deletion coordinator...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

/// 等待 `signal` 完成后关闭协调器
pub async fn shutdown_on<F>(coordinator: &DeletionCoordinator, signal: F) -> Result<ShutdownReport>
where
    F: Future<Output = ()>,
{
    signal.await;

    let report = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        coordinator.shutdown(),
    )
    .await
    .map_err(|_| {
        error!(
            "Shutdown timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        );
        ShortenerError::coordinator_stopped(format!(
            "shutdown did not complete within {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ))
    })??;

    info!(
        persisted = report.persisted_batches,
        lost = report.lost_batches,
        drained = report.drained_applies,
        aborted = report.aborted_applies,
        "Deletion coordinator shut down"
    );
    Ok(report)
}
