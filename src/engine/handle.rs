use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{FramesmithError, Result};
use super::{EngineCommand, EngineEvents, EngineObserver, ProgressUpdate, StorageEntry, TranscodeEngine};

/// Lifecycle of the shared engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Loading,
    Ready,
    /// The last load attempt failed; the next `ensure_ready` retries.
    Failed(String),
}

/// Process-wide owner of one transcoding engine.
///
/// Loading is single-flight: concurrent `ensure_ready` calls share one
/// initialization. Storage and execution go through an [`EngineRun`], and
/// only one run may exist at a time since the engine executes one
/// invocation at a time over a single shared namespace.
pub struct EngineHandle {
    engine: Box<dyn TranscodeEngine>,
    state: Mutex<EngineState>,
    load_gate: AsyncMutex<()>,
    run_gate: AsyncMutex<()>,
    events: EngineEvents,
}

impl EngineHandle {
    pub fn new<E: TranscodeEngine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
            state: Mutex::new(EngineState::Unloaded),
            load_gate: AsyncMutex::new(()),
            run_gate: AsyncMutex::new(()),
            events: EngineEvents::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Load the engine unless it is already loaded.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let _gate = self.load_gate.lock().await;
        // Another caller may have finished loading while we waited.
        if self.is_ready() {
            return Ok(());
        }

        self.set_state(EngineState::Loading);
        info!("Loading transcoding engine");

        match self.engine.load().await {
            Ok(()) => {
                self.set_state(EngineState::Ready);
                info!("Transcoding engine loaded");
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    FramesmithError::EngineLoad(reason) => reason,
                    other => other.to_string(),
                };
                error!("Transcoding engine failed to load: {}", reason);
                self.set_state(EngineState::Failed(reason.clone()));
                Err(FramesmithError::EngineLoad(reason))
            }
        }
    }

    /// Claim the engine for one pipeline run.
    ///
    /// Fails with `EngineBusy` while another run holds it.
    pub fn begin_run(&self) -> Result<EngineRun<'_>> {
        let guard = self
            .run_gate
            .try_lock()
            .map_err(|_| FramesmithError::EngineBusy)?;
        let id = Uuid::new_v4();
        debug!("Engine run {} started", id);

        Ok(EngineRun {
            handle: self,
            _guard: guard,
            id,
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.events.subscribe(observer);
    }

    pub fn latest_progress(&self) -> Option<ProgressUpdate> {
        self.events.latest_progress()
    }

    pub fn latest_log(&self) -> Option<String> {
        self.events.latest_log()
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(FramesmithError::EngineNotReady { operation })
        }
    }
}

/// Exclusive access to the engine for the duration of one pipeline run.
pub struct EngineRun<'a> {
    handle: &'a EngineHandle,
    _guard: AsyncMutexGuard<'a, ()>,
    id: Uuid,
}

impl EngineRun<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.handle.require_ready("write")?;
        debug!("[{}] Staging {} ({} bytes)", self.id, name, data.len());
        self.handle.engine.write_file(name, data).await
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.handle.require_ready("read")?;
        self.handle.engine.read_file(name).await
    }

    pub async fn list_dir(&self, dir: &str) -> Result<Vec<StorageEntry>> {
        self.handle.require_ready("list")?;
        self.handle.engine.list_dir(dir).await
    }

    pub async fn remove_file(&self, name: &str) -> Result<()> {
        self.handle.require_ready("remove")?;
        self.handle.engine.remove_file(name).await
    }

    /// Run one invocation; a non-zero exit status or engine fault is an
    /// `EngineExecution` error carrying the argument vector.
    pub async fn execute(&self, command: &EngineCommand) -> Result<()> {
        self.handle.require_ready("execute")?;
        let argv = command.argv();
        info!("[{}] {}", self.id, command.description);
        debug!("[{}] Engine arguments: {:?}", self.id, argv);

        self.handle.events.begin_invocation();
        match self.handle.engine.execute(command, self.handle.events.clone()).await {
            Ok(0) => Ok(()),
            Ok(status) => Err(FramesmithError::EngineExecution {
                argv,
                cause: format!("{} exited with status {}", command.description, status),
            }),
            Err(e) => Err(FramesmithError::EngineExecution {
                argv,
                cause: e.to_string(),
            }),
        }
    }
}

impl Drop for EngineRun<'_> {
    fn drop(&mut self) {
        debug!("Engine run {} finished", self.id);
    }
}
