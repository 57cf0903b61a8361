// Timeline assembly
//
// - Plan: pure per-segment reconciliation (pad / speed up / truncate / silence)
//   and the end-of-track drift correction, in exact sample counts
// - Report: the drift report derived from a plan
// - Render: writes the planned track as WAV, clip by clip

pub mod plan;
pub mod render;
pub mod report;

pub use plan::{AssemblyPlan, DriftCorrection, PlannedSegment, Policy, SegmentAction, plan, reconcile};
pub use render::{Assembler, AssemblyOutcome, ClipRenderer, FfmpegClipRenderer};
pub use report::{AssemblyWarning, DriftEntry, DriftReport};
