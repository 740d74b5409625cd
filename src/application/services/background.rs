use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::ContentCache;

use super::engine_lifecycle::EngineLifecycle;

/// Polls the lifecycle manager every `check_interval` and evicts the engine
/// once it has been idle past its timeout. Stops when `shutdown` fires.
pub fn spawn_idle_monitor(
    lifecycle: Arc<EngineLifecycle>,
    check_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            check_interval_secs = check_interval.as_secs(),
            idle_timeout_secs = lifecycle.idle_timeout().as_secs(),
            "Engine idle monitor started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(check_interval) => {
                    if lifecycle.release_on_idle() {
                        tracing::debug!("Idle monitor evicted the inference engine");
                    }
                }
            }
        }
        tracing::info!("Engine idle monitor stopped");
    })
}

/// Sweeps expired cache entries every `interval` until `shutdown` fires.
pub fn spawn_cache_janitor(
    cache: Arc<dyn ContentCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Cache janitor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let removed = cache.sweep_expired().await;
                    tracing::debug!(removed, "Periodic cache sweep finished");
                }
            }
        }
        tracing::info!("Cache janitor stopped");
    })
}

/// Waits for background tasks to finish after shutdown. A task that panicked
/// or was aborted is logged and counted rather than silently dropped.
pub async fn join_background(tasks: Vec<(&'static str, JoinHandle<()>)>) -> usize {
    let mut failed = 0;
    for (task, handle) in tasks {
        if let Err(e) = handle.await {
            failed += 1;
            tracing::error!(task, error = %e, "Background task terminated abnormally");
        }
    }
    failed
}
