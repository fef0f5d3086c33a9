use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AssembleConfig;
use crate::engine::{CommandPresets, EngineHandle, EngineRun};
use crate::error::{FramesmithError, Result};
use crate::frame_rate::FrameRate;
use crate::janitor::{self, CleanupPlan};
use crate::staging::{MAX_SEQUENCE_INDEX, extension_of, sequence_member_name, sequence_pattern, sort_by_filename};
use super::{CancelFlag, MediaBuffer};

/// Inputs for one assembly run.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    /// Frame images; reordered by file name before staging
    pub frames: Vec<MediaBuffer>,
    pub audio: Option<MediaBuffer>,
    pub frame_rate: FrameRate,
}

#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub video: MediaBuffer,
    pub frame_count: usize,
    pub frame_rate: FrameRate,
    pub with_audio: bool,
    /// Non-fatal problems, e.g. leftovers cleanup could not remove
    pub warnings: Vec<String>,
}

/// Composes an ordered frame set, and optionally an audio track, into one video.
pub struct VideoAssemblyPipeline {
    engine: Arc<EngineHandle>,
    config: AssembleConfig,
}

/// Validated, ordered input ready for staging.
struct Staging<'r> {
    frames: Vec<&'r MediaBuffer>,
    extension: String,
    audio: Option<(&'r str, &'r MediaBuffer)>,
}

impl VideoAssemblyPipeline {
    pub fn new(engine: Arc<EngineHandle>, config: AssembleConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run(&self, request: &AssemblyRequest, cancel: &CancelFlag) -> Result<AssemblyOutput> {
        let staging = self.prepare(request)?;
        cancel.check()?;

        let run = self.engine.begin_run()?;
        self.engine.ensure_ready().await?;
        info!(
            "[{}] Assembling {} frame(s) at {} fps{}",
            run.id(),
            staging.frames.len(),
            request.frame_rate,
            if staging.audio.is_some() { " with audio" } else { "" }
        );

        let outcome = self.assemble(&run, &staging, &request.frame_rate).await;

        let mut plan = CleanupPlan::new()
            .prefix(&self.config.frame_prefix)
            .name(&self.config.temp_video_name)
            .name(&self.config.output_name)
            .name(&self.config.muxed_output_name);
        if let Some((audio_name, _)) = staging.audio {
            plan = plan.name(audio_name);
        }
        let report = janitor::cleanup(&run, &plan).await;

        outcome.map(|mut output| {
            output.warnings.extend(report.warnings());
            output
        })
    }

    fn prepare<'r>(&self, request: &'r AssemblyRequest) -> Result<Staging<'r>> {
        if request.frames.is_empty() {
            return Err(FramesmithError::Validation("Please select image frames.".to_string()));
        }

        let mut frames: Vec<&MediaBuffer> = request.frames.iter().collect();
        sort_by_filename(&mut frames, |frame| frame.staged_name());

        let extension = extension_of(frames[0].staged_name())?.to_string();
        for frame in &frames[1..] {
            let found = extension_of(frame.staged_name())?;
            if !found.eq_ignore_ascii_case(&extension) {
                return Err(FramesmithError::MixedExtension {
                    expected: extension,
                    found: found.to_string(),
                    file: frame.name.clone(),
                });
            }
        }

        let last_index = (frames.len() as u64 - 1) + self.config.start_index as u64;
        if last_index > MAX_SEQUENCE_INDEX as u64 {
            return Err(FramesmithError::Validation(format!(
                "{} frames starting at index {} exceed the sequence limit of {}",
                frames.len(),
                self.config.start_index,
                MAX_SEQUENCE_INDEX
            )));
        }

        let audio = match &request.audio {
            Some(audio) => Some((self.audio_name(audio)?, audio)),
            None => None,
        };

        Ok(Staging { frames, extension, audio })
    }

    fn audio_name<'a>(&self, audio: &'a MediaBuffer) -> Result<&'a str> {
        let name = audio.staged_name();
        let reserved = [
            &self.config.output_name,
            &self.config.temp_video_name,
            &self.config.muxed_output_name,
        ];
        if name.is_empty() {
            return Err(FramesmithError::Validation("Audio track has no file name".to_string()));
        }
        if reserved.iter().any(|r| r.as_str() == name) || name.starts_with(self.config.frame_prefix.as_str()) {
            return Err(FramesmithError::Validation(format!(
                "Audio file name '{}' collides with a staged file; rename it",
                name
            )));
        }
        Ok(name)
    }

    async fn assemble(&self, run: &EngineRun<'_>, staging: &Staging<'_>, frame_rate: &FrameRate) -> Result<AssemblyOutput> {
        let prefix = &self.config.frame_prefix;

        for (offset, frame) in staging.frames.iter().enumerate() {
            let name = sequence_member_name(self.config.start_index + offset as u32, &staging.extension, prefix)?;
            run.write_file(&name, &frame.bytes).await?;
        }

        let base = CommandPresets::encode_sequence(
            &self.config,
            frame_rate,
            &sequence_pattern(prefix, &staging.extension),
        );

        let mut warnings = Vec::new();
        let result_name = match staging.audio {
            None => {
                run.execute(&base).await?;
                self.config.output_name.as_str()
            }
            Some((audio_name, audio)) => {
                run.write_file(audio_name, &audio.bytes).await?;

                let temp_name = self.config.temp_video_name.as_str();
                run.execute(&base.redirect_output(temp_name)).await?;

                let muxed_name = self.config.muxed_output_name.as_str();
                let mux = CommandPresets::mux_audio(&self.config, temp_name, audio_name, muxed_name);
                run.execute(&mux).await?;

                if let Err(e) = run.remove_file(temp_name).await {
                    warn!("[{}] Could not remove {}: {}", run.id(), temp_name, e);
                    warnings.push(format!("Could not remove {}: {}", temp_name, e));
                }
                muxed_name
            }
        };

        let bytes = run.read_file(result_name).await?;
        info!("[{}] Created {} ({} bytes)", run.id(), result_name, bytes.len());

        Ok(AssemblyOutput {
            video: MediaBuffer::new(result_name, bytes),
            frame_count: staging.frames.len(),
            frame_rate: frame_rate.clone(),
            with_audio: staging.audio.is_some(),
            warnings,
        })
    }
}
