use async_trait::async_trait;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{FramesmithError, Result};
use super::{EngineCommand, EngineEvents, StorageEntry, TranscodeEngine};

/// Arguments placed before every invocation: quiet banner, no prompts,
/// overwrite outputs, machine-readable progress on stdout.
const BASE_ARGS: [&str; 8] = [
    "-hide_banner", "-nostdin", "-y", "-progress", "pipe:1", "-nostats", "-loglevel", "info",
];

/// Engine backed by the ffmpeg executable.
///
/// Working storage is a private directory created on load and removed on
/// drop. With `working_dir` configured it is created inside that directory,
/// so files already there are never staged over or cleaned up.
pub struct FfmpegEngine {
    config: EngineConfig,
    storage: OnceLock<TempDir>,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            storage: OnceLock::new(),
        }
    }

    /// Working storage location, once loaded
    pub fn working_dir(&self) -> Option<&Path> {
        self.storage.get().map(TempDir::path)
    }

    async fn version_info(&self) -> Result<String> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FramesmithError::EngineLoad(format!("{} not found: {}", self.config.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FramesmithError::EngineLoad(format!("version check failed: {}", stderr.trim())));
        }

        let version_info = String::from_utf8_lossy(&output.stdout);
        Ok(version_info.lines().next().unwrap_or("Unknown version").to_string())
    }

    fn root(&self, operation: &'static str, name: &str) -> Result<&Path> {
        self.working_dir().ok_or_else(|| {
            FramesmithError::storage(
                operation,
                name,
                std::io::Error::new(std::io::ErrorKind::NotFound, "working storage is not initialized"),
            )
        })
    }

    /// Resolve a storage name, refusing anything that would leave the namespace.
    fn resolve(&self, operation: &'static str, name: &str) -> Result<PathBuf> {
        let root = self.root(operation, name)?;
        if !is_plain_name(name) {
            return Err(FramesmithError::storage(
                operation,
                name,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "name escapes working storage"),
            ));
        }
        Ok(root.join(name))
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Argument vector as handed to ffmpeg.
///
/// ffmpeg reads `<word>:` at the start of a file name as a protocol, so input
/// and output names containing a colon are pinned to the `file:` protocol.
fn engine_argv(command: &EngineCommand) -> Vec<String> {
    let mut argv = Vec::with_capacity(command.args.len() + 1);
    let mut next_is_input = false;
    for arg in &command.args {
        if next_is_input {
            argv.push(local_file(arg).into_owned());
        } else {
            argv.push(arg.clone());
        }
        next_is_input = arg == "-i";
    }
    if let Some(output) = &command.output {
        argv.push(local_file(output).into_owned());
    }
    argv
}

fn local_file(name: &str) -> Cow<'_, str> {
    if name.contains(':') && !name.starts_with("file:") {
        Cow::Owned(format!("file:{}", name))
    } else {
        Cow::Borrowed(name)
    }
}

/// Feed every line of `reader` to `on_line`, decoding lossily.
///
/// ffmpeg echoes container metadata as raw bytes, so lines are not
/// guaranteed to be UTF-8.
async fn for_each_line<R, F>(reader: R, mut on_line: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        on_line(line.trim_end_matches(['\n', '\r']));
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn load(&self) -> Result<()> {
        if self.storage.get().is_some() {
            return Ok(());
        }

        let version = self.version_info().await?;
        info!("Using {}", version);

        let mut builder = tempfile::Builder::new();
        builder.prefix("framesmith-");
        let created = match &self.config.working_dir {
            Some(parent) => {
                fs::create_dir_all(parent).await.map_err(|e| {
                    FramesmithError::EngineLoad(format!("cannot create working storage in {}: {}", parent.display(), e))
                })?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        let storage = created
            .map_err(|e| FramesmithError::EngineLoad(format!("cannot create working storage: {}", e)))?;

        debug!("Working storage at {}", storage.path().display());
        // A concurrent loader that lost the race drops its directory here.
        let _ = self.storage.set(storage);
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve("write", name)?;
        fs::write(&path, data)
            .await
            .map_err(|e| FramesmithError::storage("write", name, e))
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve("read", name)?;
        fs::read(&path)
            .await
            .map_err(|e| FramesmithError::storage("read", name, e))
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<StorageEntry>> {
        let path = match dir {
            "" | "." => self.root("list", dir)?.to_path_buf(),
            _ => self.resolve("list", dir)?,
        };

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&path)
            .await
            .map_err(|e| FramesmithError::storage("list", dir, e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FramesmithError::storage("list", dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(StorageEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir,
            });
        }

        Ok(entries)
    }

    async fn remove_file(&self, name: &str) -> Result<()> {
        let path = self.resolve("remove", name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| FramesmithError::storage("remove", name, e))
    }

    async fn execute(&self, command: &EngineCommand, events: EngineEvents) -> Result<i32> {
        let root = self.root("execute", &command.description)?;

        let mut child = Command::new(&self.config.binary_path)
            .args(BASE_ARGS)
            .args(engine_argv(command))
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FramesmithError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to execute {}: {}", self.config.binary_path, e),
            )))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tracker = ProgressTracker::default();

        let read_log = async {
            match stderr {
                Some(stderr) => {
                    for_each_line(stderr, |line| {
                        tracker.observe_log(line);
                        events.log(line);
                    })
                    .await
                }
                None => Ok(()),
            }
        };

        let read_progress = async {
            match stdout {
                Some(stdout) => {
                    for_each_line(stdout, |line| {
                        if let Some((ratio, elapsed)) = tracker.observe_progress(line) {
                            events.progress(ratio, elapsed);
                        }
                    })
                    .await
                }
                None => Ok(()),
            }
        };

        let (log_result, progress_result) = tokio::join!(read_log, read_progress);
        log_result?;
        progress_result?;

        let status = child.wait().await?;
        debug!("{} finished with {}", command.description, status);
        Ok(status.code().unwrap_or(-1))
    }
}

/// Turns ffmpeg's `-progress` key/value stream into completion ratios.
///
/// The total comes from the first `Duration:` line of the log; without it
/// only the final `progress=end` produces a ratio.
#[derive(Default)]
struct ProgressTracker {
    total: Mutex<Option<f64>>,
    elapsed: Mutex<f64>,
}

impl ProgressTracker {
    fn observe_log(&self, line: &str) {
        let mut total = self.total.lock().unwrap_or_else(PoisonError::into_inner);
        if total.is_none() {
            *total = parse_duration_line(line);
        }
    }

    fn observe_progress(&self, line: &str) -> Option<(f64, Duration)> {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        match parse_progress_line(line)? {
            ProgressKey::OutTime(seconds) => {
                *elapsed = seconds;
                let total = (*self.total.lock().unwrap_or_else(PoisonError::into_inner))?;
                (total > 0.0).then(|| (seconds / total, Duration::from_secs_f64(seconds)))
            }
            ProgressKey::End => Some((1.0, Duration::from_secs_f64(*elapsed))),
        }
    }
}

#[derive(Debug, PartialEq)]
enum ProgressKey {
    OutTime(f64),
    End,
}

fn parse_progress_line(line: &str) -> Option<ProgressKey> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // out_time_ms carries microseconds as well
        "out_time_us" | "out_time_ms" => {
            let micros: i64 = value.trim().parse().ok()?;
            Some(ProgressKey::OutTime(micros.max(0) as f64 / 1_000_000.0))
        }
        "progress" if value.trim() == "end" => Some(ProgressKey::End),
        _ => None,
    }
}

/// Seconds from a `  Duration: 00:01:02.50, start: ...` log line.
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.split(',').next()?.trim();
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
