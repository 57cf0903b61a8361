use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, RedubError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Minimal chat-completions client returning schema-constrained JSON
pub struct ChatClient {
    client: Client,
    config: TranslateConfig,
}

impl ChatClient {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TranslateConfig {
        &self.config
    }

    /// Send a system + user prompt and return the raw JSON content of the reply
    pub async fn complete_json(&self, system: &str, user: &str, schema_name: &str, schema: Value) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: user.to_string() },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema,
                }
            }
        });

        let url = format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending chat request to: {}", url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RedubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RedubError::Translation(format!(
                "Chat API error {}: {}", status, error_text
            )));
        }

        let parsed: ChatResponse = response.json().await
            .map_err(|e| RedubError::Translation(format!("Failed to parse response: {}", e)))?;

        let content = parsed.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        debug!("Raw chat response: {}", content);

        if content.is_empty() {
            return Err(RedubError::Translation("Empty response received".to_string()));
        }
        Ok(content)
    }
}

/// Human-readable name for a language code, used in prompts
pub fn language_code_to_name(code: &str) -> &str {
    match code.to_lowercase().as_str() {
        "es" => "Spanish",
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "pt" => "Portuguese",
        "it" => "Italian",
        "ja" => "Japanese",
        _ => code,
    }
}
