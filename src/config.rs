use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, FramesmithError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub extract: ExtractConfig,
    pub assemble: AssembleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Parent of the private working storage; the system temp directory when unset.
    /// Each load gets its own subdirectory, so existing files here are never touched.
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Prefix of the frame files the engine writes
    pub frame_prefix: String,
    /// Image format of extracted frames
    pub frame_extension: String,
    /// Extraction rate in frames per second. Every decoded frame is kept when unset.
    pub fps: Option<String>,
    /// Name of the extracted audio track
    pub audio_file_name: String,
    /// Variable bitrate quality for the audio track (0 = best)
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleConfig {
    /// Prefix of the staged input frames
    pub frame_prefix: String,
    /// Index of the first staged frame
    pub start_index: u32,
    /// Frame rate used when the caller does not give one
    pub default_frame_rate: String,
    pub video_codec: String,
    /// Pixel format for broad playback compatibility
    pub pixel_format: String,
    pub audio_codec: String,
    /// Result name when no audio track is supplied
    pub output_name: String,
    /// Intermediate video written before the audio mux pass
    pub temp_video_name: String,
    /// Result name when an audio track is muxed in
    pub muxed_output_name: String,
    /// Additional encoder options appended before the output name
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub encoder_options: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            working_dir: None,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            frame_prefix: "frame_".to_string(),
            frame_extension: "png".to_string(),
            fps: None,
            audio_file_name: "extracted_audio.mp3".to_string(),
            audio_quality: "0".to_string(),
        }
    }
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            frame_prefix: "input_frame_".to_string(),
            start_index: 0,
            default_frame_rate: "25".to_string(),
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            output_name: "output.mp4".to_string(),
            temp_video_name: "temp_video.mp4".to_string(),
            muxed_output_name: "final_video_with_audio.mp4".to_string(),
            encoder_options: vec![],
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FramesmithError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FramesmithError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FramesmithError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FramesmithError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [extract]
            fps = "10"

            [assemble]
            encoder_options = ["-crf", "23"]
            "#,
        )
        .unwrap();

        assert_eq!(config.extract.fps.as_deref(), Some("10"));
        assert_eq!(config.extract.frame_prefix, "frame_");
        assert_eq!(config.assemble.encoder_options, vec!["-crf", "23"]);
        assert_eq!(config.assemble.output_name, "output.mp4");
        assert_eq!(config.engine.binary_path, "ffmpeg");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.assemble.start_index = 1;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.assemble.start_index, 1);
        assert_eq!(loaded.extract.audio_file_name, "extracted_audio.mp3");
    }

    #[test]
    fn test_unreadable_config_is_config_error() {
        let err = Config::from_file("/nonexistent/framesmith.toml").unwrap_err();
        assert!(matches!(err, FramesmithError::Config(_)));
    }
}
