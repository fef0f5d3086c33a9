use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// A progress notification from a running engine invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Completion ratio in [0, 1]
    pub ratio: f64,
    /// Media time processed so far
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Completion rounded to a whole percent, for display.
    pub fn percent(&self) -> u8 {
        (self.ratio * 100.0).round() as u8
    }
}

/// Receives engine notifications.
///
/// Callbacks run on the engine's reader tasks and must return quickly; they
/// observe the invocation and cannot influence it.
pub trait EngineObserver: Send + Sync {
    fn on_progress(&self, _update: &ProgressUpdate) {}

    fn on_log(&self, _line: &str) {}
}

#[derive(Default)]
struct Latest {
    progress: Option<ProgressUpdate>,
    log: Option<String>,
}

#[derive(Default)]
struct Inner {
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
    latest: Mutex<Latest>,
}

/// Fan-out relay for progress and log notifications.
///
/// Only the most recent progress value and log line are retained. Within
/// one invocation, progress never moves backwards.
#[derive(Clone, Default)]
pub struct EngineEvents {
    inner: Arc<Inner>,
}

impl EngineEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Reset the per-invocation progress floor.
    pub fn begin_invocation(&self) {
        self.latest().progress = None;
    }

    pub fn progress(&self, ratio: f64, elapsed: Duration) {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let update = {
            let mut latest = self.latest();
            if let Some(previous) = latest.progress {
                if ratio < previous.ratio {
                    return;
                }
            }
            let update = ProgressUpdate { ratio, elapsed };
            latest.progress = Some(update);
            update
        };

        for observer in self.observers() {
            observer.on_progress(&update);
        }
    }

    pub fn log(&self, line: &str) {
        debug!(target: "engine", "{}", line);
        self.latest().log = Some(line.to_string());

        for observer in self.observers() {
            observer.on_log(line);
        }
    }

    pub fn latest_progress(&self) -> Option<ProgressUpdate> {
        self.latest().progress
    }

    pub fn latest_log(&self) -> Option<String> {
        self.latest().log.clone()
    }

    fn latest(&self) -> std::sync::MutexGuard<'_, Latest> {
        self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Observers are called without holding the lock so they may subscribe others.
    fn observers(&self) -> Vec<Arc<dyn EngineObserver>> {
        self.inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for EngineEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEvents")
            .field("latest_progress", &self.latest_progress())
            .field("latest_log", &self.latest_log())
            .finish()
    }
}
