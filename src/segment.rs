use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::budget::estimate_budget;
use crate::error::{Result, RedubError};

/// A contiguous span of speech, carried through transcription, translation
/// and synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub syllable_budget: u32,
    #[serde(default)]
    pub synthesized_duration: Option<f64>,
    #[serde(default)]
    pub synthesized_audio_ref: Option<PathBuf>,
}

impl Segment {
    pub fn new(index: usize, start_time: f64, end_time: f64, source_text: impl Into<String>) -> Self {
        Self {
            index,
            start_time,
            end_time,
            source_text: source_text.into(),
            translated_text: String::new(),
            syllable_budget: 0,
            synthesized_duration: None,
            synthesized_audio_ref: None,
        }
    }

    /// Time span the segment must occupy in the output track
    pub fn window(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn has_audio(&self) -> bool {
        self.synthesized_audio_ref.is_some() && self.synthesized_duration.is_some()
    }

    pub fn with_audio(mut self, path: impl Into<PathBuf>, duration: f64) -> Self {
        self.synthesized_audio_ref = Some(path.into());
        self.synthesized_duration = Some(duration);
        self
    }
}

/// Ordered segments of one video plus the video's length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub segments: Vec<Segment>,
    pub total_duration: f64,
}

impl Timeline {
    pub fn new(segments: Vec<Segment>, total_duration: f64) -> Self {
        Self { segments, total_duration }
    }

    /// Recompute every segment's syllable budget for the given speech rate.
    pub fn apply_budgets(&mut self, speech_rate: f64) {
        for segment in &mut self.segments {
            segment.syllable_budget = estimate_budget(segment.start_time, segment.end_time, speech_rate);
        }
    }

    /// Check the structural invariants the assembler relies on.
    ///
    /// A last segment ending after `total_duration` is not rejected here; the
    /// assembler trims the track and reports it as a drift correction.
    pub fn validate(&self) -> Result<()> {
        if !self.total_duration.is_finite() || self.total_duration <= 0.0 {
            return Err(RedubError::DataIntegrity(format!(
                "total duration must be positive, got {}",
                self.total_duration
            )));
        }

        let mut previous: Option<&Segment> = None;
        for segment in &self.segments {
            if !segment.start_time.is_finite() || !segment.end_time.is_finite() {
                return Err(RedubError::DataIntegrity(format!(
                    "segment {} has non-finite timing",
                    segment.index
                )));
            }
            if segment.start_time < 0.0 {
                return Err(RedubError::DataIntegrity(format!(
                    "segment {} starts before zero ({:.3}s)",
                    segment.index, segment.start_time
                )));
            }
            if segment.window() <= 0.0 {
                return Err(RedubError::DataIntegrity(format!(
                    "segment {} has an empty window ({:.3}s..{:.3}s)",
                    segment.index, segment.start_time, segment.end_time
                )));
            }
            if let Some(duration) = segment.synthesized_duration {
                if !duration.is_finite() || duration < 0.0 {
                    return Err(RedubError::DataIntegrity(format!(
                        "segment {} has invalid synthesized duration {}",
                        segment.index, duration
                    )));
                }
            }

            if let Some(prev) = previous {
                if segment.index <= prev.index {
                    return Err(RedubError::DataIntegrity(format!(
                        "segment {} follows segment {}; indices must increase",
                        segment.index, prev.index
                    )));
                }
                if segment.start_time < prev.end_time {
                    return Err(RedubError::DataIntegrity(format!(
                        "segment {} ({:.3}s) overlaps segment {} (ends {:.3}s)",
                        segment.index, segment.start_time, prev.index, prev.end_time
                    )));
                }
            }
            previous = Some(segment);
        }

        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentsFile {
    List(Vec<Segment>),
    Wrapped { segments: Vec<Segment> },
}

/// Read segments from a JSON file holding either a bare array or an object
/// with a `segments` field, such as a pipeline manifest.
pub fn read_segments<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RedubError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let segments = match serde_json::from_str(&content)? {
        SegmentsFile::List(segments) => segments,
        SegmentsFile::Wrapped { segments } => segments,
    };
    Ok(segments)
}
