//! Framesmith - video to frames, frames to video
//!
//! Orchestrates an external transcoding engine (ffmpeg) to split a video into
//! an ordered set of still frames plus its audio track, and to assemble
//! frames and an optional audio track back into a single video.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame_rate;
pub mod janitor;
pub mod pipeline;
pub mod presenter;
pub mod staging;
pub mod workflow;
