use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::plan::{self, AssemblyPlan, PlannedSegment, SegmentAction};
use super::report::{AssemblyWarning, DriftReport};
use crate::config::{AlignConfig, MediaConfig};
use crate::error::{Result, RedubError};
use crate::media::{ClipRenderSpec, MediaCommandBuilder};
use crate::segment::Timeline;

/// Turns a synthesized clip into PCM WAV matching the track format.
pub trait ClipRenderer: Send + Sync {
    fn render(&self, source: &Path, spec: &ClipRenderSpec, output: &Path) -> Result<()>;
}

/// Renders clips with ffmpeg (`atempo` for speed-up, `afade` on truncation)
pub struct FfmpegClipRenderer {
    command_builder: MediaCommandBuilder,
}

impl FfmpegClipRenderer {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(&config.binary_path, &config.probe_path),
        }
    }
}

impl ClipRenderer for FfmpegClipRenderer {
    fn render(&self, source: &Path, spec: &ClipRenderSpec, output: &Path) -> Result<()> {
        self.command_builder.render_clip(source, output, spec).run_blocking()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    pub track: PathBuf,
    pub report: DriftReport,
}

/// Writes frames into the output track, refusing anything past the target
/// length so an overrunning last segment is trimmed in place.
struct TrackWriter {
    writer: WavWriter<BufWriter<File>>,
    channels: u16,
    written_frames: u64,
    limit_frames: u64,
}

impl TrackWriter {
    fn remaining(&self) -> u64 {
        self.limit_frames.saturating_sub(self.written_frames)
    }

    fn write_silence(&mut self, frames: u64) -> Result<()> {
        let frames = frames.min(self.remaining());
        for _ in 0..frames * self.channels as u64 {
            self.writer.write_sample(0i16)?;
        }
        self.written_frames += frames;
        Ok(())
    }

    /// Copy exactly `frames` frames from `samples`, zero-filling if the clip
    /// runs short.
    fn write_clip<I>(&mut self, samples: I, frames: u64) -> Result<()>
    where
        I: Iterator<Item = Result<i16>>,
    {
        let frames = frames.min(self.remaining());
        let wanted = frames * self.channels as u64;
        let mut copied = 0u64;

        for sample in samples.take(wanted as usize) {
            self.writer.write_sample(sample?)?;
            copied += 1;
        }
        for _ in copied..wanted {
            self.writer.write_sample(0i16)?;
        }

        self.written_frames += frames;
        Ok(())
    }

    fn finalize(self) -> Result<u64> {
        self.writer.finalize()?;
        Ok(self.written_frames)
    }
}

/// Assembles a timeline into one track of exactly the video's length.
pub struct Assembler {
    config: AlignConfig,
    renderer: Box<dyn ClipRenderer>,
}

impl Assembler {
    pub fn new(config: AlignConfig, renderer: Box<dyn ClipRenderer>) -> Self {
        Self { config, renderer }
    }

    /// Assembler backed by ffmpeg clip rendering
    pub fn with_ffmpeg(config: AlignConfig, media: &MediaConfig) -> Self {
        Self::new(config, Box::new(FfmpegClipRenderer::new(media)))
    }

    /// Plan without rendering. Clip files that no longer exist are treated
    /// as missing audio, the same way `assemble` does.
    pub fn plan(&self, timeline: &Timeline) -> Result<AssemblyPlan> {
        plan::plan(&with_existing_clips(timeline), &self.config)
    }

    /// Build the track at `output_path` and return it with its drift report.
    ///
    /// Data-integrity errors surface before any file is created. The track is
    /// written to a temporary file beside `output_path` and only moved into
    /// place once complete.
    pub fn assemble(&self, timeline: &Timeline, output_path: &Path) -> Result<AssemblyOutcome> {
        let plan = self.plan(timeline)?;
        let report = DriftReport::from_plan(&plan);

        for warning in report.warnings() {
            match warning {
                AssemblyWarning::GlobalDriftCorrection { .. } => info!("{}", warning),
                _ => warn!("{}", warning),
            }
        }

        let output_dir = match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&output_dir)?;

        let clip_dir = tempfile::Builder::new().prefix("redub-clips-").tempdir()?;
        let track_path = tempfile::Builder::new()
            .prefix(".redub-track-")
            .suffix(".wav")
            .tempfile_in(&output_dir)?
            .into_temp_path();

        let spec = WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut track = TrackWriter {
            writer: WavWriter::create(&track_path, spec)?,
            channels: self.config.channels,
            written_frames: 0,
            limit_frames: plan.total_samples,
        };

        for planned in &plan.segments {
            track.write_silence(planned.lead_in_samples)?;
            self.write_segment(&mut track, planned, clip_dir.path())?;
        }
        track.write_silence(track.remaining())?;

        let frames = track.finalize()?;
        debug!("Wrote {} frames ({} expected)", frames, plan.total_samples);

        track_path
            .persist(output_path)
            .map_err(|e| RedubError::Io(e.error))?;

        info!(
            "Assembled {} segments into {} ({:.3}s)",
            plan.segments.len(),
            output_path.display(),
            plan.total_duration
        );

        Ok(AssemblyOutcome {
            track: output_path.to_path_buf(),
            report,
        })
    }

    fn write_segment(&self, track: &mut TrackWriter, planned: &PlannedSegment, clip_dir: &Path) -> Result<()> {
        let source = match (&planned.action, &planned.source) {
            (SegmentAction::MissingAudio, _) | (_, None) => {
                return track.write_silence(planned.window_samples);
            }
            (_, Some(source)) => source,
        };

        let fade_out = match planned.action {
            SegmentAction::Truncate { .. } if self.config.fade_out_ms > 0 => {
                Some((self.config.fade_out_ms as f64 / 1000.0).min(planned.window))
            }
            _ => None,
        };
        let spec = ClipRenderSpec {
            tempo: planned.action.tempo(),
            max_duration: planned.window,
            fade_out,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
        };

        let rendered = clip_dir.join(format!("clip_{:04}.wav", planned.index));
        debug!("Rendering segment {} ({:?}) from {}", planned.index, planned.action, source.display());
        self.renderer.render(source, &spec, &rendered)?;

        let mut reader = WavReader::open(&rendered)?;
        let clip_spec = reader.spec();
        if clip_spec.channels != self.config.channels || clip_spec.sample_rate != self.config.sample_rate {
            return Err(RedubError::Media(format!(
                "rendered clip for segment {} is {} Hz/{} ch, expected {} Hz/{} ch",
                planned.index,
                clip_spec.sample_rate,
                clip_spec.channels,
                self.config.sample_rate,
                self.config.channels
            )));
        }

        match (clip_spec.sample_format, clip_spec.bits_per_sample) {
            (SampleFormat::Int, 16) => {
                let samples = reader.samples::<i16>().map(|s| s.map_err(RedubError::from));
                track.write_clip(samples, planned.window_samples)
            }
            (SampleFormat::Int, bits) if bits > 16 && bits <= 32 => {
                let shift = bits - 16;
                let samples = reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16).map_err(RedubError::from));
                track.write_clip(samples, planned.window_samples)
            }
            (SampleFormat::Float, 32) => {
                let samples = reader
                    .samples::<f32>()
                    .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).map_err(RedubError::from));
                track.write_clip(samples, planned.window_samples)
            }
            (format, bits) => Err(RedubError::UnsupportedFormat(format!(
                "{:?} {}-bit clip for segment {}",
                format, bits, planned.index
            ))),
        }
    }
}

/// Drop clip references whose files are gone so they degrade to silence.
fn with_existing_clips(timeline: &Timeline) -> Timeline {
    let mut resolved = timeline.clone();
    for segment in &mut resolved.segments {
        if let Some(path) = &segment.synthesized_audio_ref {
            if !path.exists() {
                warn!("Clip for segment {} not found at {}", segment.index, path.display());
                segment.synthesized_audio_ref = None;
            }
        }
    }
    resolved
}
