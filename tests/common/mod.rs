//! In-memory stand-in for the transcoding engine.
//!
//! A "video" is the text `frames=N`: decomposition writes N frame files,
//! encoding an image sequence writes `frames=<count>` back out, so frame
//! counts survive a round trip.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use framesmith::engine::{EngineCommand, EngineEvents, StorageEntry, TranscodeEngine};
use framesmith::error::{FramesmithError, Result};

#[derive(Default)]
pub struct FakeOptions {
    pub load_delay: Duration,
    pub execute_delay: Duration,
    pub fail_load: bool,
    /// Invocations (by description) that exit with status 1
    pub failing_commands: HashSet<String>,
    /// Invocations (by description) that write their outputs, then exit with status 1
    pub failing_after_output: HashSet<String>,
    /// Names whose removal fails
    pub failing_removals: HashSet<String>,
    /// Make decomposition succeed without writing any frames
    pub produce_no_frames: bool,
}

#[derive(Default)]
struct FakeState {
    options: FakeOptions,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    loads: AtomicUsize,
    executions: Mutex<Vec<Vec<String>>>,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    removals: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FakeOptions) -> Self {
        Self {
            state: Arc::new(FakeState {
                options,
                ..FakeState::default()
            }),
        }
    }

    pub fn load_count(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> Vec<Vec<String>> {
        self.state.executions.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.state.writes.lock().unwrap().clone()
    }

    pub fn removals(&self) -> Vec<String> {
        self.state.removals.lock().unwrap().clone()
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.state.files.lock().unwrap().keys().cloned().collect()
    }

    fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(name).cloned()
    }

    fn put(&self, name: String, data: Vec<u8>) {
        self.state.files.lock().unwrap().insert(name, data);
    }

    fn simulate(&self, command: &EngineCommand) -> i32 {
        let args = &command.args;
        let inputs: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "-i")
            .map(|(_, value)| value)
            .collect();
        let Some(output) = command.output.clone() else {
            return 1;
        };

        if args.iter().any(|a| a == "-shortest") {
            // Mux: video from the first input, audio from the second.
            let (Some(video), Some(_audio)) = (self.file(inputs[0]), inputs.get(1).and_then(|a| self.file(a))) else {
                return 1;
            };
            let mut muxed = video;
            muxed.extend_from_slice(b"+audio");
            self.put(output, muxed);
            0
        } else if args.iter().any(|a| a == "-framerate") {
            let pattern = inputs[0];
            let start: u32 = value_after(args, "-start_number").and_then(|v| v.parse().ok()).unwrap_or(0);
            let mut count = 0;
            while self.file(&expand(pattern, start + count)).is_some() {
                count += 1;
            }
            if count == 0 {
                return 1;
            }
            self.put(output, format!("frames={}", count).into_bytes());
            0
        } else if args.iter().any(|a| a == "-vn") {
            if self.file(inputs[0]).is_none() {
                return 1;
            }
            self.put(output, b"audio-track".to_vec());
            0
        } else {
            let Some(video) = self.file(inputs[0]) else {
                return 1;
            };
            let frames = frame_count(&video);
            if !self.state.options.produce_no_frames {
                // Image sequence outputs start at 1.
                for i in 1..=frames {
                    self.put(expand(&output, i), format!("frame {}", i).into_bytes());
                }
            }
            0
        }
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1))
}

fn expand(pattern: &str, index: u32) -> String {
    pattern.replace("%04d", &format!("{:04}", index))
}

pub fn video_with_frames(count: u32) -> Vec<u8> {
    format!("frames={}", count).into_bytes()
}

pub fn frame_count(video: &[u8]) -> u32 {
    String::from_utf8_lossy(video)
        .trim_start_matches("frames=")
        .split('+')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn load(&self) -> Result<()> {
        self.state.loads.fetch_add(1, Ordering::SeqCst);
        if !self.state.options.load_delay.is_zero() {
            tokio::time::sleep(self.state.options.load_delay).await;
        }
        if self.state.options.fail_load {
            return Err(FramesmithError::EngineLoad("runtime assets unavailable".to_string()));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.state.writes.lock().unwrap().push((name.to_string(), data.to_vec()));
        self.put(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.file(name).ok_or_else(|| {
            FramesmithError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()))
        })
    }

    async fn list_dir(&self, _dir: &str) -> Result<Vec<StorageEntry>> {
        Ok(self.stored_names().into_iter().map(StorageEntry::file).collect())
    }

    async fn remove_file(&self, name: &str) -> Result<()> {
        self.state.removals.lock().unwrap().push(name.to_string());
        if self.state.options.failing_removals.contains(name) {
            return Err(FramesmithError::Io(std::io::Error::other("file is locked")));
        }
        self.state.files.lock().unwrap().remove(name);
        Ok(())
    }

    async fn execute(&self, command: &EngineCommand, events: EngineEvents) -> Result<i32> {
        self.state.executions.lock().unwrap().push(command.argv());
        events.log(&format!("fake: {}", command.description));
        events.progress(0.5, Duration::from_millis(500));
        if !self.state.options.execute_delay.is_zero() {
            tokio::time::sleep(self.state.options.execute_delay).await;
        }

        if self.state.options.failing_commands.contains(&command.description) {
            return Ok(1);
        }
        let status = self.simulate(command);
        if self.state.options.failing_after_output.contains(&command.description) {
            return Ok(1);
        }
        events.progress(1.0, Duration::from_secs(1));
        Ok(status)
    }
}
