//! Framesmith - video to frames, frames to video
//!
//! Command-line entry point: reads the picked files from disk, runs one
//! conversion through the shared engine and saves the results to a directory.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use framesmith::cli::{Args, Commands};
use framesmith::config::Config;
use framesmith::engine::{EngineHandle, FfmpegEngine};
use framesmith::pipeline::{CancelFlag, MediaBuffer};
use framesmith::presenter::{DirectoryPresenter, ProgressBarObserver};
use framesmith::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    let (output_dir, job) = match args.command {
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
            return Ok(());
        }
        Commands::Extract { input, output_dir, fps } => {
            if fps.is_some() {
                config.extract.fps = fps;
            }
            (output_dir, Job::Extract { input })
        }
        Commands::Assemble { frames, audio, framerate, output_dir } => {
            let framerate = framerate.unwrap_or_else(|| config.assemble.default_frame_rate.clone());
            (output_dir, Job::Assemble { frames, audio, framerate })
        }
    };

    let engine = Arc::new(EngineHandle::new(FfmpegEngine::new(config.engine.clone())));
    let progress = Arc::new(ProgressBarObserver::new());
    engine.subscribe(progress.clone());

    let presenter = Arc::new(DirectoryPresenter::new(&output_dir));
    let workflow = Workflow::new(config, engine, presenter)?;
    workflow.load_engine().await?;

    // Ctrl-C only takes effect before staging begins.
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match job {
        Job::Extract { input } => {
            info!("Extracting frames from: {}", input.display());
            let video = MediaBuffer::from_path(&input).await?;
            workflow.video_to_frames(Some(video), &cancel).await.map(|_| ())
        }
        Job::Assemble { frames, audio, framerate } => {
            info!("Assembling {} input path(s) into a video", frames.len());
            let frames = read_frames(&frames).await?;
            let audio = match audio {
                Some(path) => Some(MediaBuffer::from_path(&path).await?),
                None => None,
            };
            workflow.frames_to_video(frames, audio, &framerate, &cancel).await.map(|_| ())
        }
    };
    progress.finish();
    result?;

    info!("Results saved to {}", output_dir.display());
    Ok(())
}

enum Job {
    Extract {
        input: PathBuf,
    },
    Assemble {
        frames: Vec<PathBuf>,
        audio: Option<PathBuf>,
        framerate: String,
    },
}

/// Read frame files; directories contribute their visible files, one level deep.
async fn read_frames(paths: &[PathBuf]) -> Result<Vec<MediaBuffer>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if !entry.file_name().to_string_lossy().starts_with('.') {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    let mut frames = Vec::with_capacity(files.len());
    for file in files {
        frames.push(MediaBuffer::from_path(&file).await?);
    }
    Ok(frames)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".framesmith").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "framesmith.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("framesmith.log").display());

    Ok(())
}
