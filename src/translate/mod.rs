// Translation behind traits
//
// - Common: chat-completions client shared by translation and review
// - OpenAI: batched translation bounded by each segment's syllable budget
// - Review: post-translation quality pass that corrects flagged segments

pub mod common;
pub mod openai;
pub mod review;

use async_trait::async_trait;

pub use common::*;
pub use review::{ReviewIssue, apply_review};
use crate::config::TranslateConfig;
use crate::error::Result;
use crate::segment::Segment;

/// Translates segment source text into the target language
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// One translation per input segment, in input order
    async fn translate(&self, segments: &[Segment]) -> Result<Vec<String>>;
}

/// Checks translations and proposes corrections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, segments: &[Segment]) -> Result<Vec<ReviewIssue>>;
}

/// Apply translations returned by a `Translator` to their segments
pub fn apply_translations(segments: &mut [Segment], translations: Vec<String>) -> Result<()> {
    if translations.len() != segments.len() {
        return Err(crate::error::RedubError::Translation(format!(
            "Expected {} translations, got {}",
            segments.len(),
            translations.len()
        )));
    }
    for (segment, text) in segments.iter_mut().zip(translations) {
        segment.translated_text = text;
    }
    Ok(())
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Box<dyn Translator>> {
        Ok(Box::new(openai::OpenAiTranslator::new(config)?))
    }

    pub fn create_reviewer(config: TranslateConfig) -> Result<Box<dyn Reviewer>> {
        Ok(Box::new(review::OpenAiReviewer::new(config)?))
    }
}
