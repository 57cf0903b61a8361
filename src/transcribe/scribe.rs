use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{Result, RedubError};
use super::{GroupingRules, Transcript, TranscriberTrait, TranscriptWord};

/// ElevenLabs speech-to-text response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScribeResponse {
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<ScribeWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScribeWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// "word", "spacing" or "audio_event"
    #[serde(rename = "type", default = "default_word_type")]
    pub kind: String,
}

fn default_word_type() -> String {
    "word".to_string()
}

impl ScribeResponse {
    /// Timed words, without spacing tokens and audio events
    pub fn words(&self) -> Vec<TranscriptWord> {
        self.words
            .iter()
            .filter(|w| w.kind == "word")
            .map(|w| TranscriptWord {
                start: w.start,
                end: w.end,
                text: w.text.trim().to_string(),
            })
            .filter(|w| !w.text.is_empty())
            .collect()
    }
}

/// Transcriber backed by the ElevenLabs Scribe API
pub struct ScribeTranscriber {
    client: Client,
    config: TranscriberConfig,
}

impl ScribeTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    fn grouping_rules(&self) -> GroupingRules {
        GroupingRules {
            max_pause: self.config.max_pause,
            max_segment_duration: self.config.max_segment_duration,
        }
    }
}

#[async_trait]
impl TranscriberTrait for ScribeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        info!("Transcribing {} with {}", audio_path.display(), self.config.model_id);

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        let form = Form::new()
            .text("model_id", self.config.model_id.clone())
            .text("language_code", self.config.language.clone())
            .text("timestamps_granularity", "word")
            .part("file", Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/v1/speech-to-text", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending transcription request to: {}", url);

        let response = self.client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RedubError::Transcription(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RedubError::Transcription(format!(
                "Speech-to-text API error {}: {}", status, error_text
            )));
        }

        let parsed: ScribeResponse = response.json().await
            .map_err(|e| RedubError::Transcription(format!("Failed to parse response: {}", e)))?;

        let language = parsed.language_code.clone().unwrap_or_else(|| self.config.language.clone());
        let transcript = Transcript::from_words(&parsed.words(), &self.grouping_rules(), language);

        info!("Transcription produced {} segments", transcript.segments.len());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_filters_non_words() {
        let json = r#"{
            "language_code": "en",
            "text": "Hi there.",
            "words": [
                {"text": "Hi", "start": 0.0, "end": 0.2, "type": "word"},
                {"text": " ", "start": 0.2, "end": 0.25, "type": "spacing"},
                {"text": "(laughs)", "start": 0.25, "end": 0.5, "type": "audio_event"},
                {"text": "there.", "start": 0.5, "end": 0.9, "type": "word"}
            ]
        }"#;
        let response: ScribeResponse = serde_json::from_str(json).unwrap();
        let words = response.words();
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].text, "there.");
    }

    #[test]
    fn test_missing_type_defaults_to_word() {
        let json = r#"{"words": [{"text": "ok", "start": 1.0, "end": 1.5}]}"#;
        let response: ScribeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.words().len(), 1);
        assert!(response.language_code.is_none());
    }
}
