use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::engine::EngineHandle;
use crate::error::{FramesmithError, Result};
use crate::frame_rate::FrameRate;
use crate::pipeline::{
    AssemblyOutput, AssemblyRequest, CancelFlag, ExtractionOutput, FrameExtractionPipeline, MediaBuffer,
    VideoAssemblyPipeline,
};

/// Where results and status messages go.
///
/// There is a single status message at any time; each call replaces it.
/// Presented output is never withdrawn when a later run fails.
#[async_trait]
pub trait Presenter: Send + Sync {
    fn set_status(&self, message: &str);

    async fn present_extraction(&self, output: &ExtractionOutput) -> Result<()>;

    async fn present_assembly(&self, output: &AssemblyOutput) -> Result<()>;
}

/// Ties the shared engine, both pipelines and a presenter together.
pub struct Workflow {
    engine: Arc<EngineHandle>,
    extraction: FrameExtractionPipeline,
    assembly: VideoAssemblyPipeline,
    presenter: Arc<dyn Presenter>,
}

impl Workflow {
    pub fn new(config: Config, engine: Arc<EngineHandle>, presenter: Arc<dyn Presenter>) -> Result<Self> {
        let extraction = FrameExtractionPipeline::new(engine.clone(), config.extract)?;
        let assembly = VideoAssemblyPipeline::new(engine.clone(), config.assemble);

        Ok(Self {
            engine,
            extraction,
            assembly,
            presenter,
        })
    }

    pub fn engine(&self) -> &Arc<EngineHandle> {
        &self.engine
    }

    /// Load the engine up front so the first conversion does not wait for it.
    pub async fn load_engine(&self) -> Result<()> {
        if self.engine.is_ready() {
            self.presenter.set_status("FFmpeg already loaded.");
            return Ok(());
        }

        self.presenter.set_status("Loading FFmpeg... This might take a moment.");
        match self.engine.ensure_ready().await {
            Ok(()) => {
                self.presenter.set_status("FFmpeg loaded successfully!");
                Ok(())
            }
            Err(e) => {
                self.presenter.set_status(&format!("Error loading FFmpeg: {}", e));
                Err(e)
            }
        }
    }

    /// Split a video into frames and an audio track, then present them.
    pub async fn video_to_frames(&self, video: Option<MediaBuffer>, cancel: &CancelFlag) -> Result<ExtractionOutput> {
        let Some(video) = video else {
            return Err(self.report(
                "Error processing video",
                FramesmithError::Validation("Please select a video file.".to_string()),
            ));
        };

        info!("Converting {} to frames", video.name);
        self.presenter.set_status("Converting video to frames and extracting audio...");

        let output = match self.extraction.run(&video, cancel).await {
            Ok(output) => output,
            Err(e) => return Err(self.report("Error processing video", e)),
        };
        if let Err(e) = self.presenter.present_extraction(&output).await {
            return Err(self.report("Error processing video", e));
        }

        if output.frames.is_empty() {
            self.presenter
                .set_status("No frames were extracted. Check video format or the engine log for errors.");
        } else {
            self.presenter.set_status("Video converted to frames and audio extracted!");
        }
        Ok(output)
    }

    /// Assemble frames, and an optional audio track, into one video and present it.
    ///
    /// `frame_rate` is caller text and is validated before anything is staged.
    pub async fn frames_to_video(
        &self,
        frames: Vec<MediaBuffer>,
        audio: Option<MediaBuffer>,
        frame_rate: &str,
        cancel: &CancelFlag,
    ) -> Result<AssemblyOutput> {
        const CONTEXT: &str = "Error processing frames to video";

        if frames.is_empty() {
            return Err(self.report(CONTEXT, FramesmithError::Validation("Please select image frames.".to_string())));
        }
        let frame_rate = match FrameRate::parse(frame_rate) {
            Ok(rate) => rate,
            Err(e) => return Err(self.report(CONTEXT, e)),
        };

        let request = AssemblyRequest { frames, audio, frame_rate };
        self.presenter.set_status(if request.audio.is_some() {
            "Converting frames to video and adding audio..."
        } else {
            "Converting frames to video..."
        });

        let output = match self.assembly.run(&request, cancel).await {
            Ok(output) => output,
            Err(e) => return Err(self.report(CONTEXT, e)),
        };
        if let Err(e) = self.presenter.present_assembly(&output).await {
            return Err(self.report(CONTEXT, e));
        }

        self.presenter.set_status("Video created successfully!");
        Ok(output)
    }

    fn report(&self, context: &str, e: FramesmithError) -> FramesmithError {
        match &e {
            FramesmithError::Validation(message) => self.presenter.set_status(message),
            FramesmithError::EngineBusy => {
                self.presenter.set_status("A conversion is already running. Please wait for it to finish.")
            }
            _ => {
                error!("{}: {}", context, e);
                self.presenter.set_status(&format!("{}: {}", context, e));
            }
        }
        e
    }
}
