//! Best-effort removal of staged files after a pipeline run.
//!
//! Cleanup never fails: each removal is attempted independently and failures
//! are logged and counted in the returned [`CleanupReport`].

use tracing::{debug, info, warn};

use crate::engine::EngineRun;

/// Which working storage entries a run leaves behind.
#[derive(Debug, Clone, Default)]
pub struct CleanupPlan {
    prefixes: Vec<String>,
    names: Vec<String>,
}

impl CleanupPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry whose name starts with `prefix`
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Remove the entry called `name`
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    /// Entries that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per entry left behind, for attaching to a run's output
    pub fn warnings(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(name, reason)| format!("Could not remove {} from working storage: {}", name, reason))
            .collect()
    }
}

/// Remove everything in working storage matched by `plan`.
///
/// When the storage cannot be listed, the plan's explicit names are still
/// attempted.
pub async fn cleanup(run: &EngineRun<'_>, plan: &CleanupPlan) -> CleanupReport {
    let targets: Vec<String> = match run.list_dir(".").await {
        Ok(entries) => entries
            .into_iter()
            .filter(|entry| !entry.is_dir && plan.matches(&entry.name))
            .map(|entry| entry.name)
            .collect(),
        Err(e) => {
            warn!("[{}] Could not list working storage for cleanup: {}", run.id(), e);
            plan.names.clone()
        }
    };

    let mut report = CleanupReport::default();
    for name in targets {
        match run.remove_file(&name).await {
            Ok(()) => {
                debug!("[{}] Removed {}", run.id(), name);
                report.removed.push(name);
            }
            Err(e) => {
                warn!("[{}] Failed to remove {} during cleanup: {}", run.id(), name, e);
                report.failed.push((name, e.to_string()));
            }
        }
    }

    info!(
        "[{}] Cleanup removed {} file(s), {} failure(s)",
        run.id(),
        report.removed.len(),
        report.failed.len()
    );
    report
}
