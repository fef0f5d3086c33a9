use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a video into still frames and an audio track
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the frames, audio and manifest are saved to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Extraction rate in frames per second (default: every frame)
        #[arg(long)]
        fps: Option<String>,
    },

    /// Assemble still frames, and optionally an audio track, into a video
    Assemble {
        /// Frame image files, or directories containing them
        #[arg(short, long, required = true, num_args = 1..)]
        frames: Vec<PathBuf>,

        /// Audio track to mux into the video
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Frame rate of the output video (e.g. 25, 29.97, 30000/1001)
        #[arg(short = 'r', long)]
        framerate: Option<String>,

        /// Directory the video is saved to
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assemble() {
        let args = Args::try_parse_from([
            "framesmith", "assemble", "--frames", "a.png", "b.png", "--audio", "song.mp3", "-r", "30", "-o", "out",
        ])
        .unwrap();

        match args.command {
            Commands::Assemble { frames, audio, framerate, output_dir } => {
                assert_eq!(frames, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
                assert_eq!(audio, Some(PathBuf::from("song.mp3")));
                assert_eq!(framerate.as_deref(), Some("30"));
                assert_eq!(output_dir, PathBuf::from("out"));
            }
            _ => panic!("expected assemble"),
        }
    }

    #[test]
    fn test_extract_requires_input() {
        assert!(Args::try_parse_from(["framesmith", "extract", "-o", "out"]).is_err());
    }
}
