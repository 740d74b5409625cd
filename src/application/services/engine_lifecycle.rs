use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::application::ports::{
    EngineError, EngineLoader, GenerateOptions, RecognitionResult, Transcriber,
};
use crate::domain::DeviceClass;

/// Shared reference to the loaded engine. Cloning is cheap and keeps the
/// instance alive even if the lifecycle manager evicts it meanwhile.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn Transcriber>,
    device: DeviceClass,
}

impl EngineHandle {
    pub fn device(&self) -> DeviceClass {
        self.device
    }

    pub fn same_instance(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }

    pub async fn generate(
        &self,
        audio_path: &Path,
        options: &GenerateOptions,
    ) -> Result<Vec<RecognitionResult>, EngineError> {
        self.engine.generate(audio_path, options).await
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Loading,
    Loaded(DeviceClass),
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Unloaded => "unloaded",
            EngineState::Loading => "loading",
            EngineState::Loaded(_) => "loaded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Time since the last acquisition, when an instance is loaded.
    pub idle_for: Option<Duration>,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub idle_timeout: Duration,
    pub prefer_accelerator: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            prefer_accelerator: true,
        }
    }
}

/// Owns the single inference engine instance: loads it on first use, keeps
/// it warm between requests and drops it once it has been idle too long.
///
/// State transitions (load, idle eviction, forced unload) are serialized by
/// `transition`. The loaded handle sits behind a read/write lock so the
/// common case, an already-loaded engine, only takes a shared read lock.
/// `last_used` is refreshed while that read lock is held and eviction
/// re-checks idleness under the write lock, so a request that races an
/// eviction either keeps the instance alive or sees it gone and reloads.
pub struct EngineLifecycle {
    loader: Arc<dyn EngineLoader>,
    config: LifecycleConfig,
    slot: RwLock<Option<EngineHandle>>,
    transition: Mutex<()>,
    loading: AtomicBool,
    epoch: Instant,
    last_used_ms: AtomicU64,
}

impl EngineLifecycle {
    pub fn new(loader: Arc<dyn EngineLoader>, config: LifecycleConfig) -> Self {
        Self {
            loader,
            config,
            slot: RwLock::new(None),
            transition: Mutex::new(()),
            loading: AtomicBool::new(false),
            epoch: Instant::now(),
            last_used_ms: AtomicU64::new(0),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// Returns the loaded engine, initializing it first if necessary.
    ///
    /// An accelerator load that fails with `ResourceExhausted` is retried
    /// exactly once on the CPU. Every other load failure is returned as is.
    pub async fn acquire(&self) -> Result<EngineHandle, EngineError> {
        if let Some(handle) = self.loaded_handle() {
            return Ok(handle);
        }

        let _transition = self.transition.lock().await;
        if let Some(handle) = self.loaded_handle() {
            return Ok(handle);
        }

        let _loading = LoadingFlag::raise(&self.loading);
        let handle = self.initialize().await?;

        let mut slot = self.slot.write();
        *slot = Some(handle.clone());
        self.touch();
        Ok(handle)
    }

    /// Evicts the engine if it has been idle for longer than the configured
    /// timeout. Returns whether an instance was dropped. An instance still
    /// held by an in-flight request is never idle.
    ///
    /// Skips the check while another transition holds the lock; the next
    /// tick of the idle monitor tries again.
    pub fn release_on_idle(&self) -> bool {
        let Ok(_transition) = self.transition.try_lock() else {
            tracing::debug!("Engine transition in progress, skipping idle check");
            return false;
        };

        let evicted = {
            let mut slot = self.slot.write();
            // New handles are only cloned under the read lock, so the count can only fall here.
            let in_use = slot
                .as_ref()
                .is_some_and(|handle| Arc::strong_count(&handle.engine) > 1);
            if slot.is_some() && !in_use && self.idle_elapsed() > self.config.idle_timeout {
                slot.take()
            } else {
                None
            }
        };

        match evicted {
            Some(handle) => {
                self.teardown(handle, "idle timeout");
                true
            }
            None => false,
        }
    }

    /// Drops the engine immediately, e.g. after it ran out of memory during
    /// inference, so the next acquisition starts from a clean load.
    pub async fn force_unload(&self) -> bool {
        let _transition = self.transition.lock().await;
        let evicted = self.slot.write().take();
        match evicted {
            Some(handle) => {
                self.teardown(handle, "forced unload");
                true
            }
            None => false,
        }
    }

    /// Restarts the idle clock, typically once a long inference call returns.
    pub fn mark_used(&self) {
        let slot = self.slot.read();
        if slot.is_some() {
            self.touch();
        }
    }

    pub fn state(&self) -> EngineState {
        if self.loading.load(Ordering::Acquire) {
            return EngineState::Loading;
        }
        match self.slot.read().as_ref() {
            Some(handle) => EngineState::Loaded(handle.device),
            None => EngineState::Unloaded,
        }
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        let idle_for = match state {
            EngineState::Loaded(_) => Some(self.idle_elapsed()),
            _ => None,
        };
        EngineStatus {
            state,
            idle_for,
            idle_timeout: self.config.idle_timeout,
        }
    }

    fn loaded_handle(&self) -> Option<EngineHandle> {
        let slot = self.slot.read();
        let handle = slot.as_ref()?.clone();
        self.touch();
        Some(handle)
    }

    async fn initialize(&self) -> Result<EngineHandle, EngineError> {
        let preferred = if self.config.prefer_accelerator && self.loader.accelerator_available() {
            DeviceClass::Accelerator
        } else {
            DeviceClass::Cpu
        };

        let started = Instant::now();
        tracing::info!(device = %preferred, "Loading inference engine");

        let (engine, device) = match self.loader.load(preferred).await {
            Ok(engine) => (engine, preferred),
            Err(e) if e.is_resource_exhausted() && preferred.is_accelerator() => {
                tracing::warn!(
                    error = %e,
                    "Accelerator memory exhausted while loading engine, retrying on CPU"
                );
                self.loader.release_device_memory(DeviceClass::Accelerator);
                let engine = self.loader.load(DeviceClass::Cpu).await.map_err(|e| {
                    tracing::error!(error = %e, "CPU fallback engine load failed");
                    e
                })?;
                (engine, DeviceClass::Cpu)
            }
            Err(e) => {
                tracing::error!(error = %e, device = %preferred, "Engine load failed");
                return Err(e);
            }
        };

        tracing::info!(
            device = %device,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inference engine loaded"
        );

        Ok(EngineHandle { engine, device })
    }

    fn teardown(&self, handle: EngineHandle, reason: &'static str) {
        let device = handle.device;
        drop(handle);
        if device.is_accelerator() {
            self.loader.release_device_memory(device);
        }
        tracing::info!(device = %device, reason, "Inference engine unloaded");
    }

    fn touch(&self) {
        self.last_used_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Release);
    }

    fn idle_elapsed(&self) -> Duration {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last_ms = self.last_used_ms.load(Ordering::Acquire);
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }
}

struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
