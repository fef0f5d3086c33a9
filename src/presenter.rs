use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tracing::info;

use crate::engine::{EngineObserver, ProgressUpdate};
use crate::error::Result;
use crate::pipeline::{AssemblyOutput, ExtractionOutput, MediaBuffer};
use crate::workflow::Presenter;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Record of one extraction, written next to its frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionManifest {
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// Extraction rate; absent when every frame was kept
    pub fps: Option<String>,
    pub frames: Vec<String>,
    pub audio: String,
    pub warnings: Vec<String>,
}

impl From<&ExtractionOutput> for ExtractionManifest {
    fn from(output: &ExtractionOutput) -> Self {
        Self {
            source: output.source.clone(),
            created_at: Utc::now(),
            fps: output.fps.as_ref().map(|rate| rate.to_string()),
            frames: output.frames.iter().map(|f| f.name.clone()).collect(),
            audio: output.audio.name.clone(),
            warnings: output.warnings.clone(),
        }
    }
}

/// Saves every result as a downloadable file under its own name.
pub struct DirectoryPresenter {
    output_dir: PathBuf,
    status: Mutex<String>,
    echo: bool,
}

impl DirectoryPresenter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            status: Mutex::new(String::new()),
            echo: true,
        }
    }

    /// Keep status messages off stdout
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn status(&self) -> String {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn save(&self, buffer: &MediaBuffer) -> Result<PathBuf> {
        let path = self.output_dir.join(&buffer.name);
        fs::write(&path, &buffer.bytes).await?;
        Ok(path)
    }
}

#[async_trait]
impl Presenter for DirectoryPresenter {
    fn set_status(&self, message: &str) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = message.to_string();
        if self.echo {
            println!("{}", message);
        }
    }

    async fn present_extraction(&self, output: &ExtractionOutput) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await?;

        for frame in &output.frames {
            self.save(frame).await?;
        }
        let audio_path = self.save(&output.audio).await?;

        let manifest = ExtractionManifest::from(output);
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(self.output_dir.join(MANIFEST_FILE_NAME), json).await?;

        info!(
            "Saved {} frame(s) and {} to {}",
            output.frames.len(),
            audio_path.display(),
            self.output_dir.display()
        );
        Ok(())
    }

    async fn present_assembly(&self, output: &AssemblyOutput) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await?;
        let path = self.save(&output.video).await?;
        info!("Saved {} ({})", path.display(), output.video.mime_type());
        Ok(())
    }
}

/// Renders engine progress as a terminal progress bar.
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}") {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineObserver for ProgressBarObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.percent() as u64);
        self.bar.set_message(format!("{:.1}s", update.elapsed.as_secs_f64()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_rate::FrameRate;
    use assert_fs::prelude::*;

    fn extraction() -> ExtractionOutput {
        ExtractionOutput {
            source: "clip.mp4".to_string(),
            frames: vec![
                MediaBuffer::new("frame_0001.png", b"one".to_vec()),
                MediaBuffer::new("frame_0002.png", b"two".to_vec()),
            ],
            audio: MediaBuffer::new("extracted_audio.mp3", b"mp3".to_vec()),
            fps: Some(FrameRate::parse("10").unwrap()),
            warnings: vec![],
        }
    }

    #[tokio::test]
    async fn test_extraction_is_saved_with_manifest() {
        let temp = assert_fs::TempDir::new().unwrap();
        let out = temp.child("out");
        let presenter = DirectoryPresenter::new(out.path()).quiet();

        presenter.present_extraction(&extraction()).await.unwrap();

        assert_eq!(std::fs::read(out.child("frame_0002.png").path()).unwrap(), b"two");
        assert_eq!(std::fs::read(out.child("extracted_audio.mp3").path()).unwrap(), b"mp3");

        let manifest: ExtractionManifest =
            serde_json::from_slice(&std::fs::read(out.child(MANIFEST_FILE_NAME).path()).unwrap()).unwrap();
        assert_eq!(manifest.frames, vec!["frame_0001.png", "frame_0002.png"]);
        assert_eq!(manifest.fps.as_deref(), Some("10"));
        assert_eq!(manifest.source, "clip.mp4");
    }

    #[tokio::test]
    async fn test_assembly_is_saved_under_its_name() {
        let temp = assert_fs::TempDir::new().unwrap();
        let presenter = DirectoryPresenter::new(temp.path()).quiet();
        let output = AssemblyOutput {
            video: MediaBuffer::new("output.mp4", b"mp4".to_vec()),
            frame_count: 2,
            frame_rate: FrameRate::parse("25").unwrap(),
            with_audio: false,
            warnings: vec![],
        };

        presenter.present_assembly(&output).await.unwrap();
        assert_eq!(std::fs::read(temp.child("output.mp4").path()).unwrap(), b"mp4");
    }

    #[test]
    fn test_status_is_replaced() {
        let presenter = DirectoryPresenter::new("unused").quiet();
        presenter.set_status("Converting frames to video...");
        presenter.set_status("Video created successfully!");
        assert_eq!(presenter.status(), "Video created successfully!");
    }
}
