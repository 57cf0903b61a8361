use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

use crate::error::{Result, RedubError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
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
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
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

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u16) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add audio filter chain
    pub fn audio_filters(self, filters: &[String]) -> Self {
        if filters.is_empty() {
            self
        } else {
            self.arg("-af").arg(filters.join(","))
        }
    }

    /// Limit output duration
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.6}", seconds))
    }

    /// Select a stream from an input
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args);
        cmd
    }

    fn check(&self, output: Output) -> Result<Output> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RedubError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Execute the command on the calling thread
    pub fn run_blocking(&self) -> Result<Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = self.command()
            .output()
            .map_err(|e| RedubError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        self.check(output)
    }

    /// Execute the command without blocking the runtime
    pub async fn execute(&self) -> Result<Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = tokio::process::Command::from(self.command())
            .output()
            .await
            .map_err(|e| RedubError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        self.check(output)
    }
}

/// `atempo` filters for a tempo factor. A single filter only accepts
/// 0.5..=2.0, so larger or smaller factors are chained.
pub fn atempo_chain(factor: f64) -> Vec<String> {
    let mut filters = Vec::new();
    let mut remaining = factor;

    while remaining > 2.0 {
        filters.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        filters.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    filters.push(format!("atempo={:.6}", remaining));
    filters
}

/// Parameters for rendering one synthesized clip into normalized PCM
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRenderSpec {
    pub tempo: Option<f64>,
    pub max_duration: f64,
    pub fade_out: Option<f64>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Builder for common media processing operations
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    /// Build audio extraction command (16 kHz mono PCM for speech-to-text)
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Build the command replacing a video's audio with the dubbed track
    pub fn mux_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
        audio_codec: &str,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio muxing")
            .input(video_path)
            .input(audio_path)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .audio_codec(audio_codec)
            .arg("-shortest")
            .overwrite()
            .output(output_path)
    }

    /// Build the command that renders a clip to PCM WAV with the given
    /// tempo, length limit and fade-out
    pub fn render_clip<P: AsRef<Path>>(&self, source: P, output: P, spec: &ClipRenderSpec) -> MediaCommand {
        let mut filters = spec.tempo.map(atempo_chain).unwrap_or_default();
        if let Some(fade) = spec.fade_out {
            let start = (spec.max_duration - fade).max(0.0);
            filters.push(format!("afade=t=out:st={:.3}:d={:.3}", start, fade));
        }

        MediaCommand::new(&self.binary_path, "Clip rendering")
            .input(source)
            .no_video()
            .audio_filters(&filters)
            .duration(spec.max_duration)
            .audio_codec("pcm_s16le")
            .audio_sample_rate(spec.sample_rate)
            .audio_channels(spec.channels)
            .overwrite()
            .output(output)
    }

    /// Build ffprobe command printing container format as JSON
    pub fn probe_format<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .output(path)
    }

    /// Build ffprobe command listing audio streams as JSON
    pub fn probe_audio_streams<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Audio stream probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-select_streams", "a"])
            .output(path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }
}
