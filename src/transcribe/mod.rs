// Transcription behind a trait
//
// - Common: transcript types and word-to-sentence grouping
// - Scribe: ElevenLabs speech-to-text adapter

pub mod common;
pub mod scribe;

use async_trait::async_trait;
use std::path::Path;

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::Result;

/// Produces ordered, timed segments from an audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_default(config: TranscriberConfig) -> Result<Box<dyn TranscriberTrait>> {
        Ok(Box::new(scribe::ScribeTranscriber::new(config)?))
    }
}
