use crate::config::AssembleConfig;
use crate::frame_rate::FrameRate;

/// One engine invocation: an argument vector plus its output name.
///
/// The output is kept apart from the other arguments so an invocation can be
/// redirected to a different file without rebuilding it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCommand {
    pub args: Vec<String>,
    pub output: Option<String>,
    pub description: String,
}

impl EngineCommand {
    /// Create a new engine command
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            args: Vec::new(),
            output: None,
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<S: Into<String>>(self, name: S) -> Self {
        self.arg("-i").arg(name)
    }

    /// Set output file
    pub fn output<S: Into<String>>(mut self, name: S) -> Self {
        self.output = Some(name.into());
        self
    }

    /// Same invocation writing to a different output file
    pub fn redirect_output<S: Into<String>>(&self, name: S) -> Self {
        self.clone().output(name)
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Variable bitrate audio quality
    pub fn audio_quality<S: Into<String>>(self, quality: S) -> Self {
        self.arg("-q:a").arg(quality)
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Input frame rate for an image sequence
    pub fn input_frame_rate(self, rate: &FrameRate) -> Self {
        self.arg("-framerate").arg(rate.as_arg())
    }

    /// First index of an image sequence input
    pub fn start_number(self, index: u32) -> Self {
        self.arg("-start_number").arg(index.to_string())
    }

    pub fn pixel_format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-pix_fmt").arg(format)
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, specifier: S) -> Self {
        self.arg("-map").arg(specifier)
    }

    /// End the output with the shortest stream
    pub fn shortest(self) -> Self {
        self.arg("-shortest")
    }

    /// Full argument vector, output last
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(self.output.iter().cloned());
        argv
    }
}

/// Preset invocations issued by the pipelines
pub struct CommandPresets;

impl CommandPresets {
    /// Decompose a video into an image sequence
    pub fn decompose_frames(input: &str, pattern: &str, fps: Option<&FrameRate>) -> EngineCommand {
        let cmd = EngineCommand::new("Frame decomposition").input(input);
        let cmd = match fps {
            Some(rate) => cmd.video_filter(format!("fps={}", rate.as_arg())),
            None => cmd,
        };
        cmd.output(pattern)
    }

    /// Extract the audio track only, at the given quality
    pub fn extract_audio(input: &str, quality: &str, output: &str) -> EngineCommand {
        EngineCommand::new("Audio extraction")
            .input(input)
            .no_video()
            .audio_quality(quality)
            .output(output)
    }

    /// Encode an image sequence into a video
    pub fn encode_sequence(config: &AssembleConfig, rate: &FrameRate, input_pattern: &str) -> EngineCommand {
        EngineCommand::new("Image sequence encoding")
            .input_frame_rate(rate)
            .start_number(config.start_index)
            .input(input_pattern)
            .video_codec(&config.video_codec)
            .pixel_format(&config.pixel_format)
            .args(config.encoder_options.iter().cloned())
            .output(&config.output_name)
    }

    /// Mux an audio track into an encoded video, copying the video stream
    pub fn mux_audio(config: &AssembleConfig, video: &str, audio: &str, output: &str) -> EngineCommand {
        EngineCommand::new("Audio mux")
            .input(video)
            .input(audio)
            .copy_video()
            .audio_codec(&config.audio_codec)
            .map("0:v:0")
            .map("1:a:0")
            .shortest()
            .output(output)
    }
}
