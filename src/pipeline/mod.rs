// Conversion pipelines
//
// - FrameExtractionPipeline: one video -> ordered frames + audio track
// - VideoAssemblyPipeline: ordered frames (+ optional audio) -> one video
//
// Both claim the shared engine for the whole run, stage inputs, invoke the
// engine, read results back and always hand the run to the janitor.

pub mod assemble;
pub mod extract;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;

pub use assemble::*;
pub use extract::*;

use crate::error::{FramesmithError, Result};
use crate::staging::file_name_component;

/// A named byte buffer: an input picked by the user or a result to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBuffer {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MediaBuffer {
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file into memory, keeping only its file name.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .ok_or_else(|| FramesmithError::InvalidFilename(path.display().to_string()))?
            .to_string_lossy()
            .to_string();
        let bytes = fs::read(path).await?;
        Ok(Self { name, bytes })
    }

    /// MIME type guessed from the extension
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "aac" | "m4a" => "audio/aac",
            "ogg" => "audio/ogg",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "mov" => "video/quicktime",
            _ => "application/octet-stream",
        }
    }

    pub(crate) fn staged_name(&self) -> &str {
        file_name_component(&self.name)
    }
}

/// Cooperative cancellation, honored up to the point staging begins.
///
/// Once the engine is running an invocation there is no way to abort it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FramesmithError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(MediaBuffer::new("frame_0001.PNG", vec![]).mime_type(), "image/png");
        assert_eq!(MediaBuffer::new("extracted_audio.mp3", vec![]).mime_type(), "audio/mpeg");
        assert_eq!(MediaBuffer::new("output.mp4", vec![]).mime_type(), "video/mp4");
        assert_eq!(MediaBuffer::new("notes", vec![]).mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_path_keeps_file_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"video").unwrap();

        let buffer = MediaBuffer::from_path(&path).await.unwrap();
        assert_eq!(buffer.name, "clip.mp4");
        assert_eq!(buffer.bytes, b"video");
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(matches!(flag.check(), Err(FramesmithError::Cancelled)));
    }
}
