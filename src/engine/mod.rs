// Transcoding engine boundary
//
// The engine is a black box with its own isolated working storage:
// - TranscodeEngine: the operations an engine backend offers
// - EngineHandle: load-once lifecycle, run serialization and readiness guard
// - EngineEvents: progress/log relay to subscribed observers
// - Commands: invocation builders for the argument vectors the pipelines issue
// - FfmpegEngine: backend driving the ffmpeg executable in a private directory

pub mod commands;
pub mod events;
pub mod ffmpeg;
pub mod handle;

use async_trait::async_trait;

pub use commands::*;
pub use events::*;
pub use ffmpeg::FfmpegEngine;
pub use handle::*;

use crate::error::Result;

/// One entry of a working storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub name: String,
    pub is_dir: bool,
}

impl StorageEntry {
    pub fn file<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Operations offered by a transcoding engine backend.
///
/// All names are relative to the engine's working storage. Backends report
/// progress and log lines through the [`EngineEvents`] passed to `execute`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Fetch and initialize the engine's runtime assets
    async fn load(&self) -> Result<()>;

    /// Write a file into working storage, replacing any existing file
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Read a file from working storage
    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// List a directory of working storage ("." is the root)
    async fn list_dir(&self, dir: &str) -> Result<Vec<StorageEntry>>;

    /// Remove a file from working storage
    async fn remove_file(&self, name: &str) -> Result<()>;

    /// Run one invocation and return its exit status
    async fn execute(&self, command: &EngineCommand, events: EngineEvents) -> Result<i32>;
}
