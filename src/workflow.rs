use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::assemble::{Assembler, ClipRenderer, DriftReport, FfmpegClipRenderer, Policy};
use crate::config::Config;
use crate::error::{Result, RedubError};
use crate::manifest::{PipelineManifest, Stage};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::segment::{Segment, Timeline};
use crate::synthesize::{SynthesizerFactory, SynthesizerTrait, synthesize_all};
use crate::transcribe::{TranscriberFactory, TranscriberTrait};
use crate::translate::{Reviewer, Translator, TranslatorFactory, apply_review, apply_translations};

pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "mov", "avi", "webm"];

/// Rough API cost of dubbing one video, in USD
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub transcription: f64,
    pub translation: f64,
    pub synthesis: f64,
    pub total: f64,
}

impl std::ops::AddAssign for CostEstimate {
    fn add_assign(&mut self, other: Self) {
        self.transcription += other.transcription;
        self.translation += other.translation;
        self.synthesis += other.synthesis;
        self.total += other.total;
    }
}

/// Estimate API costs from the transcript and audio length.
///
/// Speech-to-text ~$0.40/hour, translation ~$2.50/M input and ~$10/M output
/// tokens (about 1.3 tokens per word in, 1.5 out, plus the prompt), speech
/// synthesis ~$0.30 per 1000 characters with Spanish ~10% longer.
pub fn estimate_cost(segments: &[Segment], audio_duration: f64) -> CostEstimate {
    let transcription = audio_duration / 3600.0 * 0.40;

    let words: usize = segments.iter().map(|s| s.source_text.split_whitespace().count()).sum();
    let input_tokens = words as f64 * 1.3 + 500.0;
    let output_tokens = words as f64 * 1.5;
    let translation = input_tokens / 1_000_000.0 * 2.50 + output_tokens / 1_000_000.0 * 10.0;

    let characters: usize = segments.iter().map(|s| s.source_text.chars().count()).sum();
    let synthesis = characters as f64 * 1.1 / 1000.0 * 0.30;

    CostEstimate {
        transcription,
        translation,
        synthesis,
        total: transcription + translation + synthesis,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Keep the per-video work directory (clips, manifest, assembled track)
    pub keep_intermediates: bool,
    /// Rerun this stage and everything after it even if the manifest has it done
    pub redo_from: Option<Stage>,
}

#[derive(Debug, Clone)]
pub struct VideoOutcome {
    pub input: PathBuf,
    /// None when the video had no speech and was skipped
    pub output_video: Option<PathBuf>,
    pub report: Option<DriftReport>,
    pub cost: CostEstimate,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub found: usize,
    pub processed: Vec<VideoOutcome>,
    pub failed: Vec<(PathBuf, String)>,
    pub cost: CostEstimate,
}

/// Everything the workflow delegates to
pub struct Collaborators {
    pub media: Arc<dyn MediaProcessorTrait>,
    pub transcriber: Box<dyn TranscriberTrait>,
    pub translator: Box<dyn Translator>,
    pub reviewer: Option<Box<dyn Reviewer>>,
    pub synthesizer: Arc<dyn SynthesizerTrait>,
    pub renderer: Box<dyn ClipRenderer>,
}

pub struct Workflow {
    config: Config,
    media: Arc<dyn MediaProcessorTrait>,
    transcriber: Box<dyn TranscriberTrait>,
    translator: Box<dyn Translator>,
    reviewer: Option<Box<dyn Reviewer>>,
    synthesizer: Arc<dyn SynthesizerTrait>,
    assembler: Arc<Assembler>,
}

impl Workflow {
    /// Build the workflow with the ffmpeg, ElevenLabs and OpenAI adapters
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        config.require_api_keys()?;

        let media: Arc<dyn MediaProcessorTrait> = MediaProcessorFactory::create_processor(config.media.clone()).into();
        // Check dependencies
        media.check_availability()?;

        let reviewer = if config.translate.review {
            Some(TranslatorFactory::create_reviewer(config.translate.clone())?)
        } else {
            None
        };

        let collaborators = Collaborators {
            media,
            transcriber: TranscriberFactory::create_default(config.transcriber.clone())?,
            translator: TranslatorFactory::create_translator(config.translate.clone())?,
            reviewer,
            synthesizer: SynthesizerFactory::create_default(config.synthesize.clone())?,
            renderer: Box::new(FfmpegClipRenderer::new(&config.media)),
        };
        Ok(Self::with_collaborators(config, collaborators))
    }

    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Self {
        let assembler = Arc::new(Assembler::new(config.align.clone(), collaborators.renderer));
        Self {
            config,
            media: collaborators.media,
            transcriber: collaborators.transcriber,
            translator: collaborators.translator,
            reviewer: collaborators.reviewer,
            synthesizer: collaborators.synthesizer,
            assembler,
        }
    }

    /// Dub a single video file
    pub async fn process_single_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Option<&Path>,
        options: &RunOptions,
    ) -> Result<VideoOutcome> {
        let input_path = input_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        if !input_path.exists() {
            return Err(RedubError::FileNotFound(input_path.display().to_string()));
        }

        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input_path.parent()
                .ok_or_else(|| RedubError::Config("Cannot determine output directory".to_string()))?
                .to_path_buf(),
        };
        fs::create_dir_all(&output_dir).await?;

        self.process_video_file(input_path, &output_dir, options).await
    }

    /// Dub every video in a directory. A failed video is logged and the
    /// batch moves on; rerunning resumes it from its manifest.
    pub async fn process_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<&Path>,
        options: &RunOptions,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(RedubError::Config("Input path is not a directory".to_string()));
        }

        let output_dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| input_dir.to_path_buf());
        fs::create_dir_all(&output_dir).await?;

        let video_files = find_videos(input_dir, &self.config.translate.target_language);
        info!("Found {} video files to process", video_files.len());

        let mut summary = BatchSummary {
            found: video_files.len(),
            ..BatchSummary::default()
        };
        for video_path in video_files {
            match self.process_video_file(&video_path, &output_dir, options).await {
                Ok(outcome) => {
                    info!("Successfully processed: {}", video_path.display());
                    summary.cost += outcome.cost;
                    summary.processed.push(outcome);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", video_path.display(), e);
                    summary.failed.push((video_path, e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    /// Paths of the dubbed video and its drift report for an input video
    pub fn output_paths(&self, video_path: &Path, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let stem = video_path.file_stem()
            .ok_or_else(|| RedubError::Config("Invalid video filename".to_string()))?
            .to_string_lossy();
        let extension = video_path.extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());
        let lang = &self.config.translate.target_language;

        Ok((
            output_dir.join(format!("{}_{}.{}", stem, lang, extension)),
            output_dir.join(format!("{}_{}.drift.json", stem, lang)),
        ))
    }

    async fn process_video_file(&self, video_path: &Path, output_dir: &Path, options: &RunOptions) -> Result<VideoOutcome> {
        let stem = video_path.file_stem()
            .ok_or_else(|| RedubError::Config("Invalid video filename".to_string()))?
            .to_string_lossy()
            .to_string();
        let work_dir = output_dir.join(format!("{}_work", stem));
        fs::create_dir_all(&work_dir).await?;

        let mut manifest = PipelineManifest::load_or_create(&work_dir, video_path, output_dir)?;
        if let Some(stage) = options.redo_from {
            info!("Rerunning from stage {}", stage);
            manifest.invalidate_from(stage);
        }
        let result = self.run_stages(video_path, output_dir, &work_dir, &mut manifest).await;

        match &result {
            Ok(outcome) if outcome.output_video.is_some() && !options.keep_intermediates => {
                if let Err(e) = fs::remove_dir_all(&work_dir).await {
                    warn!("Failed to remove {}: {}", work_dir.display(), e);
                }
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(stage) = manifest.next_stage() {
                    manifest.mark_failed(stage, &e.to_string());
                }
                if let Err(save_err) = manifest.save(&work_dir) {
                    warn!("Failed to save manifest: {}", save_err);
                }
            }
        }

        result
    }

    async fn run_stages(
        &self,
        video_path: &Path,
        output_dir: &Path,
        work_dir: &Path,
        manifest: &mut PipelineManifest,
    ) -> Result<VideoOutcome> {
        let audio_path = work_dir.join("audio.wav");

        // Step 1: Extract audio
        if manifest.should_run(Stage::Extract) {
            manifest.mark_running(Stage::Extract);
            if !self.media.has_audio_stream(video_path).await? {
                return Err(RedubError::UnsupportedFormat(format!(
                    "{} has no audio stream",
                    video_path.display()
                )));
            }
            self.media.extract_audio(video_path, &audio_path).await?;
            manifest.audio_duration = Some(self.media.probe_duration(video_path).await?);
            manifest.mark_completed(Stage::Extract);
            manifest.save(work_dir)?;
        } else {
            info!("Extract: already done, skipping");
        }

        let total_duration = match manifest.audio_duration {
            Some(duration) => duration,
            None => self.media.probe_duration(video_path).await?,
        };

        // Step 2: Transcribe
        if manifest.should_run(Stage::Transcribe) {
            manifest.mark_running(Stage::Transcribe);
            let transcript = self.transcriber.transcribe(&audio_path).await?;
            let mut timeline = Timeline::new(transcript.segments, total_duration);
            timeline.apply_budgets(self.config.align.speech_rate);
            manifest.segments = timeline.segments;
            manifest.mark_completed(Stage::Transcribe);
            manifest.save(work_dir)?;
        } else {
            info!("Transcribe: already done, skipping");
        }

        let cost = estimate_cost(&manifest.segments, total_duration);
        if manifest.segments.is_empty() {
            warn!("No speech detected in {}, skipping", video_path.display());
            return Ok(VideoOutcome {
                input: video_path.to_path_buf(),
                output_video: None,
                report: None,
                cost,
            });
        }
        info!("{} segments, estimated cost ${:.4}", manifest.segments.len(), cost.total);

        // Step 3: Translate
        if manifest.should_run(Stage::Translate) {
            manifest.mark_running(Stage::Translate);
            let translations = self.translator.translate(&manifest.segments).await?;
            apply_translations(&mut manifest.segments, translations)?;
            manifest.mark_completed(Stage::Translate);
            manifest.save(work_dir)?;
        } else {
            info!("Translate: already done, skipping");
        }

        // Step 4: Review
        if manifest.should_run(Stage::Review) {
            manifest.mark_running(Stage::Review);
            if let Some(reviewer) = &self.reviewer {
                let issues = reviewer.review(&manifest.segments).await?;
                for issue in &issues {
                    info!("Review: segment {}: {}", issue.index, issue.issue);
                }
                apply_review(&mut manifest.segments, &issues);
                manifest.review_issues = issues;
            }
            manifest.mark_completed(Stage::Review);
            manifest.save(work_dir)?;
        } else {
            info!("Review: already done, skipping");
        }

        // Step 5: Synthesize
        if manifest.should_run(Stage::Synthesize) {
            manifest.mark_running(Stage::Synthesize);
            synthesize_all(
                Arc::clone(&self.synthesizer),
                Arc::clone(&self.media),
                &mut manifest.segments,
                &work_dir.join("segments"),
                self.config.synthesize.concurrency,
            )
            .await?;
            manifest.mark_completed(Stage::Synthesize);
            manifest.save(work_dir)?;
        } else {
            info!("Synthesize: already done, skipping");
        }

        // Step 6: Assemble and mux
        let (output_video, report_path) = self.output_paths(video_path, output_dir)?;
        if manifest.should_run(Stage::Assemble) {
            manifest.mark_running(Stage::Assemble);
            let track_path = work_dir.join("assembled.wav");
            let timeline = Timeline::new(manifest.segments.clone(), total_duration);

            let assembler = Arc::clone(&self.assembler);
            let outcome = tokio::task::spawn_blocking(move || assembler.assemble(&timeline, &track_path))
                .await
                .map_err(|e| RedubError::Media(format!("Assembly task failed: {}", e)))??;

            info!(
                "Drift: {} padded, {} sped up, {} truncated, {} missing, end correction {:+.3}s",
                outcome.report.count(Policy::Pad),
                outcome.report.count(Policy::SpeedUp),
                outcome.report.count(Policy::Truncate),
                outcome.report.count(Policy::MissingAudio),
                outcome.report.correction.seconds
            );
            outcome.report.write_to(&report_path)?;

            self.media.mux_audio(video_path, &outcome.track, &output_video).await?;
            manifest.drift_report = Some(outcome.report);
            manifest.output_video = Some(output_video.clone());
            manifest.mark_completed(Stage::Assemble);
            manifest.save(work_dir)?;
        } else {
            info!("Assemble: already done, skipping");
        }

        info!("Done: {}", output_video.display());
        Ok(VideoOutcome {
            input: video_path.to_path_buf(),
            output_video: Some(output_video),
            report: manifest.drift_report.clone(),
            cost,
        })
    }
}

/// Video files under `input_dir`, sorted, excluding already-dubbed outputs
/// (`*_<lang>.<ext>`) and anything inside work directories.
pub fn find_videos(input_dir: &Path, target_language: &str) -> Vec<PathBuf> {
    let dubbed_suffix = format!("_{}", target_language);
    let mut video_files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir() && e.file_name().to_string_lossy().ends_with("_work"))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            let is_video = path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            let is_dubbed = path.file_stem()
                .map(|stem| stem.to_string_lossy().ends_with(&dubbed_suffix))
                .unwrap_or(false);
            is_video && !is_dubbed
        })
        .collect();

    video_files.sort();
    video_files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ClipRenderSpec, MockMediaProcessorTrait};
    use crate::synthesize::MockSynthesizerTrait;
    use crate::transcribe::{MockTranscriberTrait, Transcript};
    use crate::translate::{MockReviewer, MockTranslator, ReviewIssue};
    use hound::{SampleFormat, WavSpec, WavWriter};

    /// Writes a short tone instead of calling ffmpeg
    struct ToneRenderer;

    impl ClipRenderer for ToneRenderer {
        fn render(&self, _source: &Path, spec: &ClipRenderSpec, output: &Path) -> Result<()> {
            let wav_spec = WavSpec {
                channels: spec.channels,
                sample_rate: spec.sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            let mut writer = WavWriter::create(output, wav_spec)?;
            let frames = (spec.max_duration * spec.sample_rate as f64 / 2.0) as u64;
            for _ in 0..frames * spec.channels as u64 {
                writer.write_sample(1000i16)?;
            }
            writer.finalize()?;
            Ok(())
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.align.sample_rate = 8000;
        config.align.channels = 1;
        config
    }

    fn collaborators(review: bool) -> Collaborators {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_has_audio_stream().returning(|_| Ok(true));
        media.expect_extract_audio().returning(|_, audio| {
            std::fs::write(audio, b"wav").unwrap();
            Ok(())
        });
        media.expect_probe_duration().returning(|path| {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            Ok(match name.as_str() {
                "seg_0000.mp3" => 4.5,
                "seg_0001.mp3" => 7.0,
                _ => 10.0,
            })
        });
        media.expect_mux_audio().returning(|_, audio, output| {
            assert!(audio.exists());
            std::fs::write(output, b"dubbed").unwrap();
            Ok(())
        });

        let mut transcriber = MockTranscriberTrait::new();
        transcriber.expect_transcribe().times(1).returning(|_| {
            Ok(Transcript {
                segments: vec![
                    Segment::new(0, 0.0, 5.0, "Welcome to the crew."),
                    Segment::new(1, 5.0, 10.0, "Safety comes first, always."),
                ],
                full_text: "Welcome to the crew. Safety comes first, always.".to_string(),
                duration: 10.0,
                language: "en".to_string(),
            })
        });

        let mut translator = MockTranslator::new();
        translator.expect_translate().times(1).returning(|segments| {
            assert_eq!(segments[0].syllable_budget, 21);
            Ok(vec![
                "Bienvenidos al equipo.".to_string(),
                "La seguridad es primero, siempre.".to_string(),
            ])
        });

        let reviewer = review.then(|| {
            let mut reviewer = MockReviewer::new();
            reviewer.expect_review().times(1).returning(|_| {
                Ok(vec![ReviewIssue {
                    index: 1,
                    original: "Safety comes first, always.".to_string(),
                    translated: "La seguridad es primero, siempre.".to_string(),
                    corrected: "La seguridad va primero, siempre.".to_string(),
                    issue: "grammar".to_string(),
                }])
            });
            Box::new(reviewer) as Box<dyn Reviewer>
        });

        let mut synthesizer = MockSynthesizerTrait::new();
        synthesizer.expect_synthesize().times(2).returning(|_, path| {
            std::fs::write(path, b"mp3").unwrap();
            Ok(())
        });

        Collaborators {
            media: Arc::new(media),
            transcriber: Box::new(transcriber),
            translator: Box::new(translator),
            reviewer,
            synthesizer: Arc::new(synthesizer),
            renderer: Box::new(ToneRenderer),
        }
    }

    #[tokio::test]
    async fn test_process_single_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Module 1 Part 1.mp4");
        std::fs::write(&video, b"video").unwrap();
        let out_dir = dir.path().join("out");

        let workflow = Workflow::with_collaborators(test_config(), collaborators(true));
        let outcome = workflow
            .process_single_file(&video, Some(&out_dir), &RunOptions { keep_intermediates: true, redo_from: None })
            .await
            .unwrap();

        let output_video = outcome.output_video.unwrap();
        assert_eq!(output_video, out_dir.join("Module 1 Part 1_es.mp4"));
        assert!(output_video.exists());

        let report = outcome.report.unwrap();
        assert_eq!(report.count(Policy::Pad), 1);
        assert_eq!(report.count(Policy::Truncate), 1);
        assert!(out_dir.join("Module 1 Part 1_es.drift.json").exists());

        let work_dir = out_dir.join("Module 1 Part 1_work");
        let manifest = PipelineManifest::load_or_create(&work_dir, &video, &out_dir).unwrap();
        assert_eq!(manifest.next_stage(), None);
        assert_eq!(manifest.segments[1].translated_text, "La seguridad va primero, siempre.");
        assert_eq!(manifest.review_issues.len(), 1);

        let track = hound::WavReader::open(work_dir.join("assembled.wav")).unwrap();
        assert_eq!(track.duration(), 80_000);
    }

    #[tokio::test]
    async fn test_work_dir_removed_without_keep() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("intro.mov");
        std::fs::write(&video, b"video").unwrap();

        let workflow = Workflow::with_collaborators(test_config(), collaborators(false));
        let outcome = workflow
            .process_single_file(&video, None, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.output_video, Some(dir.path().join("intro_es.mov")));
        assert!(!dir.path().join("intro_work").exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let idle = Collaborators {
            media: Arc::new(MockMediaProcessorTrait::new()),
            transcriber: Box::new(MockTranscriberTrait::new()),
            translator: Box::new(MockTranslator::new()),
            reviewer: None,
            synthesizer: Arc::new(MockSynthesizerTrait::new()),
            renderer: Box::new(ToneRenderer),
        };
        let workflow = Workflow::with_collaborators(test_config(), idle);
        let err = workflow
            .process_single_file("/nonexistent/video.mp4", None, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RedubError::FileNotFound(_)));
    }

    #[test]
    fn test_find_videos_skips_outputs_and_work_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.MKV", "a_es.mkv", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("b_work")).unwrap();
        std::fs::write(dir.path().join("b_work").join("clip.mp4"), b"x").unwrap();

        let videos = find_videos(dir.path(), "es");
        assert_eq!(videos, vec![dir.path().join("a.MKV"), dir.path().join("b.mp4")]);
    }

    #[test]
    fn test_estimate_cost() {
        let segments = vec![Segment::new(0, 0.0, 2.0, "one two three four")];
        let cost = estimate_cost(&segments, 3600.0);
        assert!((cost.transcription - 0.40).abs() < 1e-9);
        assert!(cost.translation > 0.0);
        assert!((cost.total - (cost.transcription + cost.translation + cost.synthesis)).abs() < 1e-12);
    }
}
