use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::assemble::DriftReport;
use crate::error::{Result, RedubError};
use crate::segment::Segment;
use crate::translate::ReviewIssue;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transcribe,
    Translate,
    Review,
    Synthesize,
    Assemble,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Extract,
        Stage::Transcribe,
        Stage::Translate,
        Stage::Review,
        Stage::Synthesize,
        Stage::Assemble,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Review => "review",
            Stage::Synthesize => "synthesize",
            Stage::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    pub state: StageState,
    pub started_at: Option<DateTime<Local>>,
    pub completed_at: Option<DateTime<Local>>,
    pub error: Option<String>,
}

/// Progress of one video through the pipeline, persisted for resume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub input_video: PathBuf,
    pub output_dir: PathBuf,
    pub created_at: DateTime<Local>,
    pub stages: BTreeMap<Stage, StageStatus>,
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub review_issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub drift_report: Option<DriftReport>,
    #[serde(default)]
    pub output_video: Option<PathBuf>,
}

impl PipelineManifest {
    pub fn new(input_video: &Path, output_dir: &Path) -> Self {
        Self {
            input_video: input_video.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            created_at: Local::now(),
            stages: Stage::ALL.iter().map(|s| (*s, StageStatus::default())).collect(),
            audio_duration: None,
            segments: Vec::new(),
            review_issues: Vec::new(),
            drift_report: None,
            output_video: None,
        }
    }

    /// Load the manifest from `work_dir`, or start a fresh one
    pub fn load_or_create(work_dir: &Path, input_video: &Path, output_dir: &Path) -> Result<Self> {
        let path = work_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::new(input_video, output_dir));
        }

        let content = std::fs::read_to_string(&path)?;
        let mut manifest: PipelineManifest = serde_json::from_str(&content)
            .map_err(|e| RedubError::Manifest(format!("{}: {}", path.display(), e)))?;
        for stage in Stage::ALL {
            manifest.stages.entry(stage).or_default();
        }
        Ok(manifest)
    }

    pub fn save(&self, work_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(work_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(work_dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }

    pub fn status(&self, stage: Stage) -> StageState {
        self.stages.get(&stage).map(|s| s.state).unwrap_or_default()
    }

    /// A stage runs unless it already completed
    pub fn should_run(&self, stage: Stage) -> bool {
        self.status(stage) != StageState::Completed
    }

    pub fn mark_running(&mut self, stage: Stage) {
        let status = self.stages.entry(stage).or_default();
        status.state = StageState::Running;
        status.started_at = Some(Local::now());
    }

    pub fn mark_completed(&mut self, stage: Stage) {
        let status = self.stages.entry(stage).or_default();
        status.state = StageState::Completed;
        status.completed_at = Some(Local::now());
        status.error = None;
    }

    pub fn mark_failed(&mut self, stage: Stage, error: &str) {
        let status = self.stages.entry(stage).or_default();
        status.state = StageState::Failed;
        status.error = Some(error.to_string());
    }

    /// Reset `stage` and everything after it, so a later run redoes them
    pub fn invalidate_from(&mut self, stage: Stage) {
        for (_, status) in self.stages.range_mut(stage..) {
            *status = StageStatus::default();
        }
    }

    /// First stage that still has to run
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| self.should_run(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest_starts_at_extract() {
        let manifest = PipelineManifest::new(Path::new("in.mp4"), Path::new("out"));
        assert_eq!(manifest.next_stage(), Some(Stage::Extract));
        assert!(Stage::ALL.iter().all(|s| manifest.status(*s) == StageState::Pending));
    }

    #[test]
    fn test_resume_from_saved_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = PipelineManifest::new(Path::new("in.mp4"), Path::new("out"));
        manifest.mark_running(Stage::Extract);
        manifest.mark_completed(Stage::Extract);
        manifest.mark_completed(Stage::Transcribe);
        manifest.mark_failed(Stage::Translate, "rate limited");
        manifest.segments.push(Segment::new(0, 0.0, 1.0, "hello"));
        manifest.save(dir.path()).unwrap();

        let loaded = PipelineManifest::load_or_create(dir.path(), Path::new("in.mp4"), Path::new("out")).unwrap();
        assert_eq!(loaded.next_stage(), Some(Stage::Translate));
        assert_eq!(loaded.stages[&Stage::Translate].error.as_deref(), Some("rate limited"));
        assert_eq!(loaded.segments.len(), 1);
        assert!(!loaded.should_run(Stage::Transcribe));
    }

    #[test]
    fn test_invalidate_from_resets_later_stages() {
        let mut manifest = PipelineManifest::new(Path::new("in.mp4"), Path::new("out"));
        for stage in Stage::ALL {
            manifest.mark_completed(stage);
        }
        manifest.invalidate_from(Stage::Review);

        assert_eq!(manifest.status(Stage::Translate), StageState::Completed);
        assert_eq!(manifest.status(Stage::Review), StageState::Pending);
        assert_eq!(manifest.status(Stage::Assemble), StageState::Pending);
        assert_eq!(manifest.next_stage(), Some(Stage::Review));
    }

    #[test]
    fn test_corrupt_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        let err = PipelineManifest::load_or_create(dir.path(), Path::new("in.mp4"), Path::new("out")).unwrap_err();
        assert!(matches!(err, RedubError::Manifest(_)));
    }
}
