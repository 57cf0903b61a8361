use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::TranslateConfig;
use crate::error::{Result, RedubError};
use crate::segment::Segment;
use super::Translator;
use super::common::{ChatClient, language_code_to_name};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationItem {
    pub index: usize,
    pub text: String,
    pub max_syllables: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub index: usize,
    pub translated_text: String,
    pub estimated_syllables: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translations: Vec<TranslationEntry>,
}

pub fn system_prompt(target_language: &str) -> String {
    let language = language_code_to_name(target_language);
    format!(
        "You are a professional translator producing {language} dubbing scripts for \
         English training videos.\n\
         \n\
         Each item has an index, the English text and max_syllables, the number of \
         {language} syllables that fit the time the original speaker took.\n\
         - Stay within max_syllables. Cut filler words before substantive content.\n\
         - Preserve the full meaning, tone and emphasis of the original.\n\
         - The text will be read aloud by a text-to-speech voice: write natural, fluent \
         spoken {language} with complete, grammatical sentences.\n\
         - Replace idioms with natural {language} equivalents; never translate them literally.\n\
         - Keep company names and branded terms unchanged. Write \"&\" as \"and\".\n\
         - Use correct {language} punctuation and accents.\n\
         - Return one entry per item with the same index, the translated_text and your \
         estimated_syllables count, as JSON matching the schema exactly."
    )
}

pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "translations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer"},
                        "translated_text": {"type": "string"},
                        "estimated_syllables": {"type": "integer"}
                    },
                    "required": ["index", "translated_text", "estimated_syllables"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["translations"],
        "additionalProperties": false
    })
}

/// Build the request items for a batch of segments
pub fn batch_items(segments: &[Segment]) -> Vec<TranslationItem> {
    segments
        .iter()
        .map(|s| TranslationItem {
            index: s.index,
            text: s.source_text.clone(),
            max_syllables: s.syllable_budget.max(1),
        })
        .collect()
}

/// Parse a batch reply, returning translations in the batch's order
pub fn parse_batch_response(raw: &str, batch: &[Segment]) -> Result<Vec<String>> {
    let parsed: TranslationResponse = serde_json::from_str(raw)
        .map_err(|e| RedubError::Translation(format!("Invalid translation JSON: {}", e)))?;

    let mut entries = parsed.translations;
    entries.sort_by_key(|e| e.index);

    if entries.len() != batch.len() {
        return Err(RedubError::Translation(format!(
            "Expected {} translations, got {}",
            batch.len(),
            entries.len()
        )));
    }

    entries
        .into_iter()
        .zip(batch)
        .map(|(entry, segment)| {
            if entry.index != segment.index {
                return Err(RedubError::Translation(format!(
                    "Translation for segment {} missing (got index {})",
                    segment.index, entry.index
                )));
            }
            Ok(entry.translated_text.trim().to_string())
        })
        .collect()
}

/// Batched translation through a chat-completions model
pub struct OpenAiTranslator {
    chat: ChatClient,
}

impl OpenAiTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self { chat: ChatClient::new(config)? })
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, segments: &[Segment]) -> Result<Vec<String>> {
        let config = self.chat.config();
        let system = system_prompt(&config.target_language);
        let mut translations = Vec::with_capacity(segments.len());

        for (batch_no, batch) in segments.chunks(config.batch_size).enumerate() {
            info!("Translating batch {} ({} segments)", batch_no + 1, batch.len());

            let user = serde_json::to_string(&batch_items(batch))?;
            let raw = self.chat
                .complete_json(&system, &user, "translation_response", response_schema())
                .await?;

            translations.extend(parse_batch_response(&raw, batch)?);
        }

        Ok(translations)
    }
}
