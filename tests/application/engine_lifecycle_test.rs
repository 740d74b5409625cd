use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use subgen::application::ports::EngineError;
use subgen::application::services::{EngineState, join_background, spawn_idle_monitor};
use subgen::domain::DeviceClass;

use crate::helpers::{MockEngineLoader, lifecycle_with};

const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::test]
async fn given_unloaded_engine_when_acquired_then_loads_once_and_reports_loaded() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    assert_eq!(lifecycle.state(), EngineState::Unloaded);

    let first = lifecycle.acquire().await.unwrap();
    let second = lifecycle.acquire().await.unwrap();

    assert!(first.same_instance(&second));
    assert_eq!(loader.loads(), 1);
    assert_eq!(lifecycle.state(), EngineState::Loaded(DeviceClass::Cpu));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_callers_when_acquiring_then_engine_initialized_exactly_once() {
    let loader = Arc::new(MockEngineLoader::new().with_load_delay(Duration::from_millis(50)));
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.acquire().await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(loader.loads(), 1);
    assert!(handles.iter().all(|h| h.same_instance(&handles[0])));
}

#[tokio::test]
async fn given_available_accelerator_when_acquired_then_prefers_accelerator() {
    let loader = Arc::new(MockEngineLoader::new().with_accelerator());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    let handle = lifecycle.acquire().await.unwrap();

    assert_eq!(handle.device(), DeviceClass::Accelerator);
    assert_eq!(loader.devices(), vec![DeviceClass::Accelerator]);
}

#[tokio::test]
async fn given_accelerator_out_of_memory_when_acquired_then_falls_back_to_cpu_once() {
    let loader = Arc::new(
        MockEngineLoader::new()
            .with_accelerator()
            .exhausting_accelerator(),
    );
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    let handle = lifecycle.acquire().await.unwrap();

    assert_eq!(handle.device(), DeviceClass::Cpu);
    assert_eq!(loader.loads(), 2);
    assert_eq!(
        loader
            .memory_releases
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert_eq!(lifecycle.state(), EngineState::Loaded(DeviceClass::Cpu));
}

#[tokio::test]
async fn given_non_memory_load_failure_when_acquired_then_error_propagates_without_retry() {
    let loader = Arc::new(MockEngineLoader::new().with_accelerator().failing());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    let result = lifecycle.acquire().await;

    assert!(matches!(result, Err(EngineError::ModelLoadFailed(_))));
    assert_eq!(loader.loads(), 1);
    assert_eq!(lifecycle.state(), EngineState::Unloaded);
}

#[tokio::test]
async fn given_failed_load_when_acquired_again_then_retries_load() {
    let loader = Arc::new(MockEngineLoader::new().failing());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    assert!(lifecycle.acquire().await.is_err());
    assert!(lifecycle.acquire().await.is_err());

    assert_eq!(loader.loads(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_idle_engine_past_timeout_when_checked_then_unloaded_and_reloaded_on_next_acquire() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::from_secs(10));

    let first = lifecycle.acquire().await.unwrap();
    drop(first);

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(!lifecycle.release_on_idle());
    assert!(matches!(lifecycle.state(), EngineState::Loaded(_)));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(lifecycle.release_on_idle());
    assert_eq!(lifecycle.state(), EngineState::Unloaded);

    lifecycle.acquire().await.unwrap();
    assert_eq!(loader.loads(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_recent_acquisition_when_checked_then_idle_clock_restarts() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::from_secs(10));

    drop(lifecycle.acquire().await.unwrap());
    tokio::time::advance(Duration::from_secs(8)).await;
    drop(lifecycle.acquire().await.unwrap());
    tokio::time::advance(Duration::from_secs(8)).await;

    assert!(!lifecycle.release_on_idle());
    assert_eq!(loader.loads(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_handle_still_held_when_idle_timeout_passes_then_engine_not_evicted() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::from_secs(10));

    let in_flight = lifecycle.acquire().await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;

    assert!(!lifecycle.release_on_idle());
    drop(in_flight);
    assert!(lifecycle.release_on_idle());
}

#[tokio::test]
async fn given_loaded_engine_when_force_unloaded_then_held_handle_stays_usable() {
    let loader = Arc::new(MockEngineLoader::new().with_accelerator());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);

    let handle = lifecycle.acquire().await.unwrap();
    assert!(lifecycle.force_unload().await);
    assert!(!lifecycle.force_unload().await);

    assert_eq!(lifecycle.state(), EngineState::Unloaded);
    let results = handle
        .generate(std::path::Path::new("unused.wav"), &Default::default())
        .await
        .unwrap();
    assert!(!results.is_empty());

    let reloaded = lifecycle.acquire().await.unwrap();
    assert!(!reloaded.same_instance(&handle));
}

#[tokio::test]
async fn given_unloaded_engine_when_idle_checked_then_nothing_happens() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::ZERO);

    assert!(!lifecycle.release_on_idle());
    assert_eq!(loader.loads(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_loaded_engine_when_status_requested_then_reports_idle_duration() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::from_secs(30));

    assert!(lifecycle.status().idle_for.is_none());

    drop(lifecycle.acquire().await.unwrap());
    tokio::time::advance(Duration::from_secs(12)).await;

    let status = lifecycle.status();
    assert_eq!(status.idle_timeout, Duration::from_secs(30));
    assert_eq!(status.idle_for, Some(Duration::from_secs(12)));
}

#[tokio::test(start_paused = true)]
async fn given_idle_monitor_running_when_engine_goes_idle_then_monitor_evicts_it() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), Duration::from_secs(10));
    let shutdown = CancellationToken::new();

    drop(lifecycle.acquire().await.unwrap());
    let monitor = spawn_idle_monitor(Arc::clone(&lifecycle), Duration::from_secs(1), shutdown.clone());

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(lifecycle.state(), EngineState::Unloaded);

    shutdown.cancel();
    monitor.await.unwrap();
}

#[tokio::test]
async fn given_panicked_background_task_when_joined_then_failure_counted() {
    let loader = Arc::new(MockEngineLoader::new());
    let lifecycle = lifecycle_with(Arc::clone(&loader), IDLE_TIMEOUT);
    let shutdown = CancellationToken::new();
    let monitor = spawn_idle_monitor(lifecycle, Duration::from_secs(1), shutdown.clone());
    let crashed: JoinHandle<()> = tokio::spawn(async { panic!("janitor crashed") });

    shutdown.cancel();
    let failed = join_background(vec![("idle monitor", monitor), ("cache janitor", crashed)]).await;

    assert_eq!(failed, 1);
}
