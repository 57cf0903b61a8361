use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, RedubError};
use super::{MediaCommandBuilder, MediaProcessorTrait};

#[derive(Debug, Deserialize)]
struct ProbeFormatOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ProbeStreamsOutput {
    #[serde(default)]
    streams: Vec<serde_json::Value>,
}

/// Parse `ffprobe -show_format` JSON into seconds
pub fn parse_probe_duration(json: &str) -> Result<f64> {
    let parsed: ProbeFormatOutput = serde_json::from_str(json)
        .map_err(|e| RedubError::Media(format!("Unexpected ffprobe output: {}", e)))?;

    let duration: f64 = parsed.format.duration.trim().parse()
        .map_err(|_| RedubError::Media(format!("Invalid duration '{}'", parsed.format.duration)))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(RedubError::Media(format!("Invalid duration {}", duration)));
    }
    Ok(duration)
}

/// Parse `ffprobe -show_streams` JSON into a stream count
pub fn parse_stream_count(json: &str) -> Result<usize> {
    let parsed: ProbeStreamsOutput = serde_json::from_str(json)
        .map_err(|e| RedubError::Media(format!("Unexpected ffprobe output: {}", e)))?;
    Ok(parsed.streams.len())
}

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        self.command_builder.extract_audio(video_path, audio_path).execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        if !path.exists() {
            return Err(RedubError::FileNotFound(path.display().to_string()));
        }

        let output = self.command_builder.probe_format(path).execute().await?;
        let duration = parse_probe_duration(&String::from_utf8_lossy(&output.stdout))?;

        debug!("{} is {:.3}s long", path.display(), duration);
        Ok(duration)
    }

    async fn has_audio_stream(&self, path: &Path) -> Result<bool> {
        let output = self.command_builder.probe_audio_streams(path).execute().await?;
        Ok(parse_stream_count(&String::from_utf8_lossy(&output.stdout))? > 0)
    }

    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()> {
        info!("Muxing {} into {} -> {}",
              audio_path.display(), video_path.display(), output_path.display());

        self.command_builder
            .mux_audio(video_path, audio_path, output_path, &self.config.audio_codec)
            .execute()
            .await?;

        info!("Muxing completed successfully");
        Ok(())
    }

    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.binary_path, &self.config.probe_path] {
            let output = std::process::Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| RedubError::Media(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(RedubError::Media(format!("{} version check failed", binary)));
            }
        }

        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = self.command_builder.version_check().execute().await?;
        let version_info = String::from_utf8_lossy(&output.stdout);
        // First line carries the version
        let first_line = version_info.lines().next().unwrap_or("Unknown version");
        Ok(first_line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "12.345000", "size": "1"}}"#;
        assert!((parse_probe_duration(json).unwrap() - 12.345).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_duration_rejects_garbage() {
        assert!(parse_probe_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_probe_duration("not json").is_err());
    }

    #[test]
    fn test_parse_stream_count() {
        assert_eq!(parse_stream_count(r#"{"streams": [{"index": 1}]}"#).unwrap(), 1);
        assert_eq!(parse_stream_count(r#"{}"#).unwrap(), 0);
    }

    #[test]
    fn test_probe_missing_file() {
        let processor = MediaProcessorImpl::new(crate::config::Config::default().media);
        let result = tokio_test::block_on(processor.probe_duration(Path::new("/nonexistent/clip.mp3")));
        assert!(matches!(result, Err(RedubError::FileNotFound(_))));
    }
}
