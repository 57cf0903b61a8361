// Speech synthesis behind a trait
//
// - ElevenLabs: text-to-speech adapter
// - synthesize_all: concurrent synthesis of a video's segments

pub mod elevenlabs;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::SynthesizeConfig;
use crate::error::{Result, RedubError};
use crate::media::MediaProcessorTrait;
use crate::segment::Segment;

/// Renders target-language text to an audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SynthesizerTrait: Send + Sync {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create_default(config: SynthesizeConfig) -> Result<Arc<dyn SynthesizerTrait>> {
        Ok(Arc::new(elevenlabs::ElevenLabsSynthesizer::new(config)?))
    }
}

/// Clean up text that TTS engines tend to mispronounce
pub fn preprocess_tts_text(text: &str) -> String {
    let text = text.replace("I&I", "I and I").replace("I & I", "I and I");
    let text = text.replace('&', " and ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clip file name for a segment
pub fn clip_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("seg_{:04}.mp3", index))
}

/// Synthesize every segment with translated text into `output_dir`, with at
/// most `concurrency` requests in flight, and record each clip's path and
/// measured duration on its segment.
///
/// A segment whose synthesis fails keeps no audio; the assembler fills its
/// window with silence. Returns the number of segments that got audio.
pub async fn synthesize_all(
    synthesizer: Arc<dyn SynthesizerTrait>,
    media: Arc<dyn MediaProcessorTrait>,
    segments: &mut [Segment],
    output_dir: &Path,
    concurrency: usize,
) -> Result<usize> {
    tokio::fs::create_dir_all(output_dir).await?;

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    // Clips from an earlier run are stale once the text may have changed
    for segment in segments.iter_mut() {
        segment.synthesized_audio_ref = None;
        segment.synthesized_duration = None;
    }

    let pending: Vec<(usize, String)> = segments
        .iter()
        .filter(|s| !s.translated_text.trim().is_empty())
        .map(|s| (s.index, preprocess_tts_text(&s.translated_text)))
        .collect();

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} Synthesizing audio [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for (index, text) in pending {
        let synthesizer = Arc::clone(&synthesizer);
        let media = Arc::clone(&media);
        let semaphore = Arc::clone(&semaphore);
        let path = clip_path(output_dir, index);

        tasks.spawn(async move {
            let result = async {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| RedubError::Synthesis(format!("Synthesis pool closed: {}", e)))?;
                synthesizer.synthesize(&text, &path).await?;
                let duration = media.probe_duration(&path).await?;
                Ok::<_, RedubError>((path, duration))
            }
            .await;
            (index, result)
        });
    }

    let mut produced = 0;
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined
            .map_err(|e| RedubError::Synthesis(format!("Synthesis task failed: {}", e)))?;
        progress.inc(1);

        let Some(segment) = segments.iter_mut().find(|s| s.index == index) else {
            continue;
        };
        match result {
            Ok((path, duration)) => {
                segment.synthesized_audio_ref = Some(path);
                segment.synthesized_duration = Some(duration);
                produced += 1;
            }
            Err(e) => {
                warn!("Synthesis failed for segment {}: {}", index, e);
            }
        }
    }
    progress.finish_and_clear();

    info!("Synthesized {}/{} segments", produced, segments.len());
    Ok(produced)
}
