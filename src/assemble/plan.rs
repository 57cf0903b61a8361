use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::AlignConfig;
use crate::error::Result;
use crate::segment::{Segment, Timeline};

/// Which reconciliation branch fired for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    AsIs,
    Pad,
    SpeedUp,
    Truncate,
    MissingAudio,
}

/// How a synthesized clip is fitted into its window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentAction {
    /// Clip is exactly as long as the window
    AsIs,
    /// Trailing silence after the clip
    Pad { silence: f64 },
    /// Pitch-preserving time compression by `factor`
    SpeedUp { factor: f64 },
    /// Compression by the maximum factor, then `truncated` seconds cut from the tail
    Truncate { factor: f64, truncated: f64 },
    /// No synthesized audio; the window is silence
    MissingAudio,
}

impl SegmentAction {
    pub fn policy(&self) -> Policy {
        match self {
            SegmentAction::AsIs => Policy::AsIs,
            SegmentAction::Pad { .. } => Policy::Pad,
            SegmentAction::SpeedUp { .. } => Policy::SpeedUp,
            SegmentAction::Truncate { .. } => Policy::Truncate,
            SegmentAction::MissingAudio => Policy::MissingAudio,
        }
    }

    /// Tempo factor the renderer applies, if any
    pub fn tempo(&self) -> Option<f64> {
        match self {
            SegmentAction::SpeedUp { factor } | SegmentAction::Truncate { factor, .. } => Some(*factor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    pub index: usize,
    pub source: Option<PathBuf>,
    pub actual: Option<f64>,
    pub window: f64,
    /// Silence inserted before the segment to keep it on its start time
    pub lead_in: f64,
    pub lead_in_samples: u64,
    pub window_samples: u64,
    pub action: SegmentAction,
}

impl PlannedSegment {
    /// Length of the clip after the action is applied, trailing padding included.
    pub fn reconciled_duration(&self) -> f64 {
        let actual = self.actual.unwrap_or(0.0);
        match self.action {
            SegmentAction::AsIs => actual,
            SegmentAction::Pad { silence } => actual + silence,
            SegmentAction::SpeedUp { factor } => actual / factor,
            SegmentAction::Truncate { factor, truncated } => actual / factor - truncated,
            SegmentAction::MissingAudio => self.window,
        }
    }

    /// Distortion introduced, in the unit of the policy: pad seconds, speed
    /// factor, truncated seconds, or silent seconds for missing audio.
    pub fn magnitude(&self) -> f64 {
        match self.action {
            SegmentAction::AsIs => 0.0,
            SegmentAction::Pad { silence } => silence,
            SegmentAction::SpeedUp { factor } => factor,
            SegmentAction::Truncate { truncated, .. } => truncated,
            SegmentAction::MissingAudio => self.window,
        }
    }
}

/// End-of-track silence appended (positive) or trimmed (negative).
///
/// Measured against everything laid out before it: the lead-in silence of
/// every segment plus its window, so `total = sum(lead_in) + sum(window) + correction`.
/// Lead-ins are zero when gaps are not preserved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftCorrection {
    pub seconds: f64,
    pub samples: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    pub segments: Vec<PlannedSegment>,
    pub sample_rate: u32,
    pub total_duration: f64,
    pub total_samples: u64,
    pub correction: DriftCorrection,
}

impl AssemblyPlan {
    /// Samples occupied by lead-ins and windows, before the end correction
    pub fn laid_out_samples(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.lead_in_samples + s.window_samples)
            .sum()
    }
}

/// Relative slack on the speed-up limit, so a factor that equals the limit
/// up to float rounding is not truncated.
const FACTOR_TOLERANCE: f64 = 1e-9;

fn sample_position(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round().max(0.0) as u64
}

/// Pick the reconciliation branch for one segment.
pub fn reconcile(segment: &Segment, max_speedup_factor: f64) -> SegmentAction {
    let window = segment.window();
    let actual = match (&segment.synthesized_audio_ref, segment.synthesized_duration) {
        (Some(_), Some(actual)) => actual,
        _ => return SegmentAction::MissingAudio,
    };

    if actual == window {
        return SegmentAction::AsIs;
    }
    if actual < window {
        return SegmentAction::Pad { silence: window - actual };
    }

    let factor = actual / window;
    if factor <= max_speedup_factor * (1.0 + FACTOR_TOLERANCE) {
        SegmentAction::SpeedUp { factor: factor.min(max_speedup_factor) }
    } else {
        SegmentAction::Truncate {
            factor: max_speedup_factor,
            truncated: actual / max_speedup_factor - window,
        }
    }
}

/// Build the assembly plan for a timeline. Pure and deterministic: the same
/// timeline and config always produce the same plan.
pub fn plan(timeline: &Timeline, config: &AlignConfig) -> Result<AssemblyPlan> {
    config.validate()?;
    timeline.validate()?;

    let sample_rate = config.sample_rate;
    let mut segments = Vec::with_capacity(timeline.segments.len());
    let mut laid_out_seconds = 0.0;
    let mut laid_out_samples: u64 = 0;
    let mut previous_end = 0.0;

    for segment in &timeline.segments {
        let start = sample_position(segment.start_time, sample_rate);
        let end = sample_position(segment.end_time, sample_rate);

        let (lead_in, lead_in_samples) = if config.preserve_gaps {
            (
                segment.start_time - previous_end,
                start.saturating_sub(laid_out_samples),
            )
        } else {
            (0.0, 0)
        };

        let window = segment.window();
        let window_samples = end.saturating_sub(start);
        let action = reconcile(segment, config.max_speedup_factor);

        laid_out_seconds += lead_in + window;
        laid_out_samples += lead_in_samples + window_samples;
        previous_end = segment.end_time;

        segments.push(PlannedSegment {
            index: segment.index,
            source: segment.synthesized_audio_ref.clone(),
            actual: segment.synthesized_duration,
            window,
            lead_in,
            lead_in_samples,
            window_samples,
            action,
        });
    }

    let total_samples = sample_position(timeline.total_duration, sample_rate);
    let correction = DriftCorrection {
        seconds: timeline.total_duration - laid_out_seconds,
        samples: total_samples as i64 - laid_out_samples as i64,
    };

    Ok(AssemblyPlan {
        segments,
        sample_rate,
        total_duration: timeline.total_duration,
        total_samples,
        correction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RedubError;

    const EPS: f64 = 1e-9;

    fn config() -> AlignConfig {
        AlignConfig {
            sample_rate: 1000,
            channels: 1,
            ..AlignConfig::default()
        }
    }

    fn voiced(index: usize, start: f64, end: f64, actual: f64) -> Segment {
        Segment::new(index, start, end, "").with_audio(format!("seg_{:04}.mp3", index), actual)
    }

    #[test]
    fn test_short_clip_is_padded_to_window() {
        let seg = voiced(0, 0.0, 5.0, 4.5);
        let action = reconcile(&seg, 1.2);
        assert_eq!(action.policy(), Policy::Pad);
        let SegmentAction::Pad { silence } = action else { panic!("expected pad") };
        assert!((silence - 0.5).abs() < EPS);
    }

    #[test]
    fn test_exact_fit_is_used_as_is() {
        assert_eq!(reconcile(&voiced(0, 1.0, 3.0, 2.0), 1.2), SegmentAction::AsIs);
    }

    #[test]
    fn test_moderate_overrun_is_sped_up() {
        let action = reconcile(&voiced(0, 0.0, 5.0, 5.5), 1.2);
        let SegmentAction::SpeedUp { factor } = action else { panic!("expected speed up") };
        assert!((factor - 1.1).abs() < EPS);
    }

    #[test]
    fn test_boundary_factor_is_not_truncated() {
        let action = reconcile(&voiced(0, 0.0, 5.0, 6.0), 1.2);
        assert_eq!(action.policy(), Policy::SpeedUp);
    }

    #[test]
    fn test_boundary_factor_with_rounding_is_not_truncated() {
        for (start, end) in [(0.0, 0.57), (3.1, 3.67), (12.34, 13.05), (0.0, 0.1)] {
            let window: f64 = end - start;
            let action = reconcile(&voiced(0, start, end, window * 1.2), 1.2);
            let SegmentAction::SpeedUp { factor } = action else {
                panic!("expected speed up for window {}, got {:?}", window, action)
            };
            assert!(factor <= 1.2);
            assert!((factor - 1.2).abs() < EPS);
        }
        let action = reconcile(&voiced(0, 0.0, 0.57, 0.684), 1.2);
        assert_eq!(action.policy(), Policy::SpeedUp);
    }

    #[test]
    fn test_large_overrun_is_truncated_after_max_speedup() {
        let action = reconcile(&voiced(1, 5.0, 10.0, 7.0), 1.2);
        let SegmentAction::Truncate { factor, truncated } = action else {
            panic!("expected truncate")
        };
        assert_eq!(factor, 1.2);
        assert!((truncated - (7.0 / 1.2 - 5.0)).abs() < EPS);
        assert!(truncated > 0.0);
    }

    #[test]
    fn test_missing_reference_is_missing_audio() {
        let mut seg = Segment::new(0, 0.0, 2.0, "");
        seg.synthesized_duration = Some(1.0);
        assert_eq!(reconcile(&seg, 1.2), SegmentAction::MissingAudio);
    }

    #[test]
    fn test_every_branch_occupies_its_window() {
        let timeline = Timeline::new(
            vec![
                voiced(0, 0.0, 2.0, 1.0),
                voiced(1, 2.0, 4.0, 2.0),
                voiced(2, 4.0, 6.0, 2.3),
                voiced(3, 6.0, 8.0, 4.0),
                Segment::new(4, 8.0, 9.0, ""),
            ],
            9.0,
        );
        let plan = plan(&timeline, &config()).unwrap();
        for planned in &plan.segments {
            assert!(
                (planned.reconciled_duration() - planned.window).abs() < EPS,
                "segment {} reconciled to {}",
                planned.index,
                planned.reconciled_duration()
            );
        }
        let policies: Vec<Policy> = plan.segments.iter().map(|s| s.action.policy()).collect();
        assert_eq!(
            policies,
            vec![Policy::Pad, Policy::AsIs, Policy::SpeedUp, Policy::Truncate, Policy::MissingAudio]
        );
    }

    #[test]
    fn test_worked_example() {
        let timeline = Timeline::new(vec![voiced(0, 0.0, 5.0, 4.5), voiced(1, 5.0, 10.0, 7.0)], 10.0);
        let plan = plan(&timeline, &config()).unwrap();

        assert_eq!(plan.segments[0].action.policy(), Policy::Pad);
        assert!((plan.segments[0].magnitude() - 0.5).abs() < EPS);
        assert_eq!(plan.segments[1].action.policy(), Policy::Truncate);
        assert!((plan.segments[1].magnitude() - 0.833_333_333_3).abs() < 1e-6);
        assert_eq!(plan.total_samples, 10_000);
        assert_eq!(plan.laid_out_samples(), 10_000);
        assert_eq!(plan.correction.samples, 0);
        assert!(plan.correction.seconds.abs() < EPS);
    }

    #[test]
    fn test_trailing_gap_is_corrected_with_silence() {
        let timeline = Timeline::new(vec![voiced(0, 0.0, 4.0, 3.0)], 6.5);
        let plan = plan(&timeline, &config()).unwrap();
        assert!((plan.correction.seconds - 2.5).abs() < EPS);
        assert_eq!(plan.correction.samples, 2500);
    }

    #[test]
    fn test_overrun_past_total_is_trimmed() {
        let timeline = Timeline::new(vec![voiced(0, 0.0, 4.0, 3.0), voiced(1, 4.0, 11.0, 5.0)], 10.0);
        let plan = plan(&timeline, &config()).unwrap();
        assert!((plan.correction.seconds + 1.0).abs() < EPS);
        assert_eq!(plan.correction.samples, -1000);
    }

    #[test]
    fn test_gaps_preserved_as_lead_in() {
        let timeline = Timeline::new(vec![voiced(0, 0.5, 2.0, 1.0), voiced(1, 3.0, 4.0, 1.0)], 5.0);
        let plan = plan(&timeline, &config()).unwrap();

        assert!((plan.segments[0].lead_in - 0.5).abs() < EPS);
        assert_eq!(plan.segments[0].lead_in_samples, 500);
        assert!((plan.segments[1].lead_in - 1.0).abs() < EPS);
        assert_eq!(plan.segments[1].lead_in_samples, 1000);

        let lead_ins: f64 = plan.segments.iter().map(|s| s.lead_in).sum();
        let windows: f64 = plan.segments.iter().map(|s| s.window).sum();
        assert!((lead_ins + windows + plan.correction.seconds - 5.0).abs() < EPS);
    }

    #[test]
    fn test_concatenated_layout_sums_windows() {
        let config = AlignConfig {
            preserve_gaps: false,
            ..config()
        };
        let timeline = Timeline::new(vec![voiced(0, 0.5, 2.0, 1.0), voiced(1, 3.0, 4.0, 1.0)], 5.0);
        let plan = plan(&timeline, &config).unwrap();

        assert!(plan.segments.iter().all(|s| s.lead_in_samples == 0));
        let windows: f64 = plan.segments.iter().map(|s| s.window).sum();
        assert!((windows + plan.correction.seconds - 5.0).abs() < EPS);
        assert_eq!(plan.laid_out_samples() as i64 + plan.correction.samples, 5000);
    }

    #[test]
    fn test_sample_totals_are_exact_for_irregular_times() {
        let timeline = Timeline::new(
            vec![
                voiced(0, 0.1234, 1.98765, 1.5),
                voiced(1, 2.00001, 3.33333, 2.0),
                voiced(2, 3.5, 7.77777, 3.0),
            ],
            8.123456,
        );
        let config = AlignConfig {
            sample_rate: 44_100,
            ..config()
        };
        let plan = plan(&timeline, &config).unwrap();
        assert_eq!(
            plan.laid_out_samples() as i64 + plan.correction.samples,
            plan.total_samples as i64
        );
    }

    #[test]
    fn test_empty_window_is_fatal() {
        let timeline = Timeline::new(vec![voiced(0, 0.0, 2.0, 1.0), voiced(1, 2.0, 2.0, 1.0)], 5.0);
        assert!(matches!(plan(&timeline, &config()), Err(RedubError::DataIntegrity(_))));
    }

    #[test]
    fn test_empty_timeline_is_all_correction() {
        let plan = plan(&Timeline::new(vec![], 3.0), &config()).unwrap();
        assert!(plan.segments.is_empty());
        assert_eq!(plan.correction.samples, 3000);
    }
}
