use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, RedubError};

/// Approximate Spanish speaking rate in syllables per second
pub const SPANISH_SYLLABLES_PER_SECOND: f64 = 4.3;

fn default_fade_out_ms() -> u32 {
    100
}

fn default_preserve_gaps() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub align: AlignConfig,
    pub media: MediaConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub synthesize: SynthesizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Target-language speech rate in syllables per second
    pub speech_rate: f64,
    /// Largest tempo factor applied before a clip is truncated
    pub max_speedup_factor: f64,
    /// Sample rate of the assembled track
    pub sample_rate: u32,
    /// Channel count of the assembled track
    pub channels: u16,
    /// Fade-out applied to the tail of truncated clips
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: u32,
    /// Keep each segment at its original start time by inserting silence
    /// for lead-in and inter-segment gaps
    #[serde(default = "default_preserve_gaps")]
    pub preserve_gaps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Audio codec used when muxing the dubbed track into the video
    pub audio_codec: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Speech-to-text API base URL
    pub endpoint: String,
    /// API key; resolved from ELEVENLABS_API_KEY when empty
    #[serde(default)]
    pub api_key: String,
    /// Speech-to-text model
    pub model_id: String,
    /// Source language code
    pub language: String,
    /// Pause between words (seconds) that forces a new segment
    pub max_pause: f64,
    /// Longest segment (seconds) before a break is forced
    pub max_segment_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Chat completion API base URL
    pub endpoint: String,
    /// API key; resolved from OPENAI_API_KEY when empty
    #[serde(default)]
    pub api_key: String,
    /// Model used for translation and review
    pub model: String,
    /// Target language code
    pub target_language: String,
    /// Segments sent per request
    pub batch_size: usize,
    /// Run the post-translation review pass
    pub review: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeConfig {
    /// Text-to-speech API base URL
    pub endpoint: String,
    /// API key; resolved from ELEVENLABS_API_KEY when empty
    #[serde(default)]
    pub api_key: String,
    /// Voice identifier
    pub voice_id: String,
    /// Text-to-speech model
    pub model_id: String,
    /// Output format requested from the API
    pub output_format: String,
    /// Maximum requests in flight per video
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            align: AlignConfig::default(),
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                audio_codec: "aac".to_string(),
            },
            transcriber: TranscriberConfig {
                endpoint: "https://api.elevenlabs.io".to_string(),
                api_key: String::new(),
                model_id: "scribe_v1".to_string(),
                language: "en".to_string(),
                max_pause: 0.7,
                max_segment_duration: 15.0,
            },
            translate: TranslateConfig {
                endpoint: "https://api.openai.com".to_string(),
                api_key: String::new(),
                model: "o3".to_string(),
                target_language: "es".to_string(),
                batch_size: 25,
                review: true,
            },
            synthesize: SynthesizeConfig {
                endpoint: "https://api.elevenlabs.io".to_string(),
                api_key: String::new(),
                voice_id: "sDh3eviBhiuHKi0MjTNq".to_string(),
                model_id: "eleven_multilingual_v2".to_string(),
                output_format: "mp3_44100_128".to_string(),
                concurrency: default_concurrency(),
            },
        }
    }
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            speech_rate: SPANISH_SYLLABLES_PER_SECOND,
            max_speedup_factor: 1.2,
            sample_rate: 44_100,
            channels: 2,
            fade_out_ms: default_fade_out_ms(),
            preserve_gaps: default_preserve_gaps(),
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.speech_rate.is_finite() || self.speech_rate <= 0.0 {
            return Err(RedubError::Config(format!(
                "speech_rate must be positive, got {}",
                self.speech_rate
            )));
        }
        if !self.max_speedup_factor.is_finite() || self.max_speedup_factor < 1.0 {
            return Err(RedubError::Config(format!(
                "max_speedup_factor must be at least 1.0, got {}",
                self.max_speedup_factor
            )));
        }
        if self.sample_rate == 0 {
            return Err(RedubError::Config("sample_rate must be non-zero".to_string()));
        }
        if self.channels == 0 {
            return Err(RedubError::Config("channels must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RedubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| RedubError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RedubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RedubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.align.validate()?;
        if self.translate.batch_size == 0 {
            return Err(RedubError::Config("translate.batch_size must be non-zero".to_string()));
        }
        if self.synthesize.concurrency == 0 {
            return Err(RedubError::Config("synthesize.concurrency must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Fill empty API keys from the given lookup (the binary passes the
    /// process environment; tests pass a closure).
    pub fn resolve_api_keys<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.transcriber.api_key.trim().is_empty() {
            if let Some(key) = lookup("ELEVENLABS_API_KEY") {
                self.transcriber.api_key = key.trim().to_string();
            }
        }
        if self.synthesize.api_key.trim().is_empty() {
            if let Some(key) = lookup("ELEVENLABS_API_KEY") {
                self.synthesize.api_key = key.trim().to_string();
            }
        }
        if self.translate.api_key.trim().is_empty() {
            if let Some(key) = lookup("OPENAI_API_KEY") {
                self.translate.api_key = key.trim().to_string();
            }
        }
    }

    /// Ensure every collaborator that talks to a remote API has a key.
    pub fn require_api_keys(&self) -> Result<()> {
        let mut missing = Vec::new();
        if is_placeholder(&self.transcriber.api_key) || is_placeholder(&self.synthesize.api_key) {
            missing.push("ELEVENLABS_API_KEY");
        }
        if is_placeholder(&self.translate.api_key) {
            missing.push("OPENAI_API_KEY");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RedubError::Config(format!(
                "Missing or placeholder API keys: {}",
                missing.join(", ")
            )))
        }
    }
}

fn is_placeholder(key: &str) -> bool {
    const PLACEHOLDERS: [&str; 3] = [
        "your-elevenlabs-api-key-here",
        "your-openai-api-key-here",
        "sk-...",
    ];
    let key = key.trim();
    key.is_empty() || PLACEHOLDERS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.align.max_speedup_factor, 1.2);
        assert_eq!(config.align.speech_rate, 4.3);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.align.max_speedup_factor = 1.15;
        config.synthesize.concurrency = 2;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.align.max_speedup_factor, 1.15);
        assert_eq!(loaded.synthesize.concurrency, 2);
        assert_eq!(loaded.translate.model, "o3");
    }

    #[test]
    fn test_rejects_speedup_below_one() {
        let mut config = Config::default();
        config.align.max_speedup_factor = 0.9;
        assert!(matches!(config.validate(), Err(RedubError::Config(_))));
    }

    #[test]
    fn test_resolve_api_keys_keeps_explicit_values() {
        let mut config = Config::default();
        config.translate.api_key = "sk-explicit".to_string();
        config.resolve_api_keys(|name| Some(format!("{}-from-env", name)));

        assert_eq!(config.translate.api_key, "sk-explicit");
        assert_eq!(config.transcriber.api_key, "ELEVENLABS_API_KEY-from-env");
        assert_eq!(config.synthesize.api_key, "ELEVENLABS_API_KEY-from-env");
        assert!(config.require_api_keys().is_ok());
    }

    #[test]
    fn test_placeholder_keys_rejected() {
        let mut config = Config::default();
        config.resolve_api_keys(|_| Some("sk-...".to_string()));
        let err = config.require_api_keys().unwrap_err().to_string();
        assert!(err.contains("ELEVENLABS_API_KEY"));
        assert!(err.contains("OPENAI_API_KEY"));
    }
}
