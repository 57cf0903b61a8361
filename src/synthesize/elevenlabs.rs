use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::SynthesizeConfig;
use crate::error::{Result, RedubError};
use super::SynthesizerTrait;

#[derive(Debug, Clone, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Text-to-speech through the ElevenLabs API
pub struct ElevenLabsSynthesizer {
    client: Client,
    config: SynthesizeConfig,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: SynthesizeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.voice_id,
            self.config.output_format
        )
    }
}

#[async_trait]
impl SynthesizerTrait for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let url = self.url();
        debug!("Sending speech request to: {}", url);

        let response = self.client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.config.model_id,
            })
            .send()
            .await
            .map_err(|e| RedubError::Synthesis(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RedubError::Synthesis(format!(
                "Text-to-speech API error {}: {}", status, error_text
            )));
        }

        let audio = response.bytes().await
            .map_err(|e| RedubError::Synthesis(format!("Failed to read audio: {}", e)))?;
        if audio.is_empty() {
            return Err(RedubError::Synthesis("Empty audio received".to_string()));
        }

        tokio::fs::write(output_path, &audio).await?;
        Ok(())
    }
}
