use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ExtractConfig;
use crate::engine::{CommandPresets, EngineHandle, EngineRun};
use crate::error::{FramesmithError, Result};
use crate::frame_rate::FrameRate;
use crate::janitor::{self, CleanupPlan};
use crate::staging::{is_sequence_member, sequence_pattern, sort_numeric_filenames};
use super::{CancelFlag, MediaBuffer};

/// Frames and audio decomposed from one video.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Name the video was staged under
    pub source: String,
    /// Frames in index order
    pub frames: Vec<MediaBuffer>,
    pub audio: MediaBuffer,
    /// Extraction rate, when not every frame was kept
    pub fps: Option<FrameRate>,
    /// Non-fatal problems, e.g. no frames found or leftovers cleanup could not remove
    pub warnings: Vec<String>,
}

/// Decomposes a video into an ordered frame set and an audio track.
pub struct FrameExtractionPipeline {
    engine: Arc<EngineHandle>,
    config: ExtractConfig,
    fps: Option<FrameRate>,
}

impl FrameExtractionPipeline {
    /// Fails when the configured extraction rate is not a valid frame rate.
    pub fn new(engine: Arc<EngineHandle>, config: ExtractConfig) -> Result<Self> {
        let fps = config.fps.as_deref().map(FrameRate::parse).transpose()?;
        Ok(Self { engine, config, fps })
    }

    pub fn fps(&self) -> Option<&FrameRate> {
        self.fps.as_ref()
    }

    pub async fn run(&self, video: &MediaBuffer, cancel: &CancelFlag) -> Result<ExtractionOutput> {
        let input_name = self.validate(video)?;
        cancel.check()?;

        let run = self.engine.begin_run()?;
        self.engine.ensure_ready().await?;
        info!("[{}] Extracting frames and audio from {}", run.id(), input_name);

        let outcome = self.extract(&run, input_name, video).await;

        let plan = CleanupPlan::new()
            .prefix(&self.config.frame_prefix)
            .name(input_name)
            .name(&self.config.audio_file_name);
        let report = janitor::cleanup(&run, &plan).await;

        outcome.map(|mut output| {
            output.warnings.extend(report.warnings());
            output
        })
    }

    fn validate<'v>(&self, video: &'v MediaBuffer) -> Result<&'v str> {
        let name = video.staged_name();
        if name.is_empty() {
            return Err(FramesmithError::Validation("Please select a video file.".to_string()));
        }
        if video.bytes.is_empty() {
            return Err(FramesmithError::Validation(format!("Video file '{}' is empty", name)));
        }
        if name == self.config.audio_file_name
            || is_sequence_member(name, &self.config.frame_prefix, &self.config.frame_extension)
        {
            return Err(FramesmithError::Validation(format!(
                "Video file name '{}' collides with an extraction output; rename it",
                name
            )));
        }
        Ok(name)
    }

    async fn extract(&self, run: &EngineRun<'_>, input_name: &str, video: &MediaBuffer) -> Result<ExtractionOutput> {
        let prefix = &self.config.frame_prefix;
        let extension = &self.config.frame_extension;
        let audio_name = &self.config.audio_file_name;
        let mut warnings = Vec::new();

        run.write_file(input_name, &video.bytes).await?;

        let decompose = CommandPresets::decompose_frames(
            input_name,
            &sequence_pattern(prefix, extension),
            self.fps.as_ref(),
        );
        // Frames and audio are independent; a video that yields no frames
        // still gets its audio extracted. Frames written before a failure
        // are discarded rather than returned as a truncated set.
        let decomposed = match run.execute(&decompose).await {
            Ok(()) => true,
            Err(e @ FramesmithError::EngineExecution { .. }) => {
                warn!("[{}] {}", run.id(), e);
                warnings.push(format!("Frame decomposition failed: {}", e));
                false
            }
            Err(other) => return Err(other),
        };

        let audio_cmd = CommandPresets::extract_audio(input_name, &self.config.audio_quality, audio_name);
        run.execute(&audio_cmd).await?;

        let mut frame_names: Vec<String> = if decomposed {
            run.list_dir(".")
                .await?
                .into_iter()
                .filter(|entry| !entry.is_dir && is_sequence_member(&entry.name, prefix, extension))
                .map(|entry| entry.name)
                .collect()
        } else {
            Vec::new()
        };
        sort_numeric_filenames(&mut frame_names);

        if frame_names.is_empty() {
            warn!("[{}] No frame files found after extraction", run.id());
            warnings.push("No frames were extracted. Check video format or the engine log for errors.".to_string());
        }

        let mut frames = Vec::with_capacity(frame_names.len());
        for name in frame_names {
            let bytes = run.read_file(&name).await?;
            frames.push(MediaBuffer::new(name, bytes));
        }

        let audio = MediaBuffer::new(audio_name.clone(), run.read_file(audio_name).await?);

        info!("[{}] Extracted {} frame(s) and {}", run.id(), frames.len(), audio.name);
        Ok(ExtractionOutput {
            source: input_name.to_string(),
            frames,
            audio,
            fps: self.fps.clone(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockTranscodeEngine;

    fn pipeline() -> FrameExtractionPipeline {
        let engine = Arc::new(EngineHandle::new(MockTranscodeEngine::new()));
        FrameExtractionPipeline::new(engine, ExtractConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_configured_fps_is_rejected() {
        let engine = Arc::new(EngineHandle::new(MockTranscodeEngine::new()));
        let config = ExtractConfig {
            fps: Some("0".to_string()),
            ..ExtractConfig::default()
        };
        assert!(matches!(
            FrameExtractionPipeline::new(engine, config),
            Err(FramesmithError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_video_fails_before_engine_use() {
        // The mock has no expectations: any engine call would panic.
        let pipeline = pipeline();
        let err = pipeline
            .run(&MediaBuffer::new("", vec![]), &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FramesmithError::Validation(_)));
    }

    #[tokio::test]
    async fn test_colliding_video_name_is_rejected() {
        let pipeline = pipeline();
        for name in ["extracted_audio.mp3", "frame_0003.png"] {
            let err = pipeline
                .run(&MediaBuffer::new(name, b"v".to_vec()), &CancelFlag::new())
                .await
                .unwrap_err();
            assert!(matches!(err, FramesmithError::Validation(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_staging() {
        let pipeline = pipeline();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = pipeline
            .run(&MediaBuffer::new("clip.mp4", b"v".to_vec()), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FramesmithError::Cancelled));
    }
}
