// Media processing behind a trait
//
// - Commands: ffmpeg/ffprobe command builders
// - Processor: ffmpeg-backed implementation of extraction, probing and muxing

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Media operations the pipeline needs around the assembler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Extract audio from video for transcription
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Duration of an audio or video file in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Whether the file carries at least one audio stream
    async fn has_audio_stream(&self, path: &Path) -> Result<bool>;

    /// Replace the audio of `video_path` with `audio_path`, keeping the video stream
    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()>;

    /// Check if media processor is available
    fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
