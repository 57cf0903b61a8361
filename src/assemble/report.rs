use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::plan::{AssemblyPlan, DriftCorrection, Policy};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEntry {
    pub segment_index: usize,
    pub policy: Policy,
    /// Pad seconds, speed factor, truncated seconds, or silent seconds
    pub magnitude: f64,
    /// Silence placed before the segment
    pub lead_in: f64,
}

/// Per-segment record of how each clip was fitted, for QA after assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub total_duration: f64,
    pub entries: Vec<DriftEntry>,
    pub correction: DriftCorrection,
}

/// Recoverable or informational conditions raised during assembly
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyWarning {
    MissingAudio { segment_index: usize },
    ExcessiveSpeedup { segment_index: usize, truncated: f64 },
    GlobalDriftCorrection { seconds: f64 },
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyWarning::MissingAudio { segment_index } => {
                write!(f, "segment {} has no synthesized audio, filled with silence", segment_index)
            }
            AssemblyWarning::ExcessiveSpeedup { segment_index, truncated } => {
                write!(f, "segment {} truncated by {:.3}s after maximum speed-up", segment_index, truncated)
            }
            AssemblyWarning::GlobalDriftCorrection { seconds } if *seconds >= 0.0 => {
                write!(f, "appended {:.3}s of silence at end of track", seconds)
            }
            AssemblyWarning::GlobalDriftCorrection { seconds } => {
                write!(f, "trimmed {:.3}s from end of track", -seconds)
            }
        }
    }
}

impl DriftReport {
    pub fn from_plan(plan: &AssemblyPlan) -> Self {
        let entries = plan
            .segments
            .iter()
            .map(|planned| DriftEntry {
                segment_index: planned.index,
                policy: planned.action.policy(),
                magnitude: planned.magnitude(),
                lead_in: planned.lead_in,
            })
            .collect();

        Self {
            total_duration: plan.total_duration,
            entries,
            correction: plan.correction,
        }
    }

    /// Number of entries that took the given branch
    pub fn count(&self, policy: Policy) -> usize {
        self.entries.iter().filter(|e| e.policy == policy).count()
    }

    /// All warnings in segment order, ending with the drift correction,
    /// which is always present.
    pub fn warnings(&self) -> Vec<AssemblyWarning> {
        let mut warnings: Vec<AssemblyWarning> = self
            .entries
            .iter()
            .filter_map(|entry| match entry.policy {
                Policy::MissingAudio => Some(AssemblyWarning::MissingAudio {
                    segment_index: entry.segment_index,
                }),
                Policy::Truncate => Some(AssemblyWarning::ExcessiveSpeedup {
                    segment_index: entry.segment_index,
                    truncated: entry.magnitude,
                }),
                _ => None,
            })
            .collect();

        warnings.push(AssemblyWarning::GlobalDriftCorrection {
            seconds: self.correction.seconds,
        });
        warnings
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
