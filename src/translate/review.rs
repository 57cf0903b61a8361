use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::TranslateConfig;
use crate::error::{Result, RedubError};
use crate::segment::Segment;
use super::Reviewer;
use super::common::{ChatClient, language_code_to_name};

/// A translation the reviewer flagged and corrected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub index: usize,
    pub original: String,
    pub translated: String,
    pub corrected: String,
    pub issue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewItem {
    index: usize,
    source: String,
    translation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewEntry {
    index: usize,
    ok: bool,
    #[serde(default)]
    corrected_text: String,
    #[serde(default)]
    issue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewResponse {
    reviews: Vec<ReviewEntry>,
}

fn review_prompt(target_language: &str) -> String {
    let language = language_code_to_name(target_language);
    format!(
        "You review {language} dubbing scripts before they are sent to a text-to-speech \
         engine. Each item has the English source and its {language} translation.\n\
         \n\
         Flag a translation when it has broken grammar or incomplete clauses, crams \
         several ideas into a confusing run-on sentence, drops important content from \
         the source, mistranslates domain terminology, or contains text a TTS voice is \
         likely to mispronounce (ampersands, unexpanded abbreviations).\n\
         \n\
         For every item return its index and ok. When ok is false, give corrected_text \
         and a short issue description; otherwise leave both empty. Do not change \
         translations that are already correct."
    )
}

fn review_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "reviews": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer"},
                        "ok": {"type": "boolean"},
                        "corrected_text": {"type": "string"},
                        "issue": {"type": "string"}
                    },
                    "required": ["index", "ok", "corrected_text", "issue"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["reviews"],
        "additionalProperties": false
    })
}

/// Turn a review reply into issues for the flagged segments of `batch`
fn parse_review_response(raw: &str, batch: &[Segment]) -> Result<Vec<ReviewIssue>> {
    let parsed: ReviewResponse = serde_json::from_str(raw)
        .map_err(|e| RedubError::Translation(format!("Invalid review JSON: {}", e)))?;

    let mut issues = Vec::new();
    for entry in parsed.reviews.into_iter().filter(|r| !r.ok) {
        let Some(segment) = batch.iter().find(|s| s.index == entry.index) else {
            continue;
        };
        let corrected = entry.corrected_text.trim();
        if corrected.is_empty() || corrected == segment.translated_text {
            continue;
        }

        issues.push(ReviewIssue {
            index: segment.index,
            original: segment.source_text.clone(),
            translated: segment.translated_text.clone(),
            corrected: corrected.to_string(),
            issue: if entry.issue.trim().is_empty() {
                "unspecified".to_string()
            } else {
                entry.issue.trim().to_string()
            },
        });
    }
    Ok(issues)
}

/// Write reviewer corrections back into the segments they refer to
pub fn apply_review(segments: &mut [Segment], issues: &[ReviewIssue]) {
    for issue in issues {
        if let Some(segment) = segments.iter_mut().find(|s| s.index == issue.index) {
            segment.translated_text = issue.corrected.clone();
        }
    }
}

/// Post-translation review through a chat-completions model
pub struct OpenAiReviewer {
    chat: ChatClient,
}

impl OpenAiReviewer {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self { chat: ChatClient::new(config)? })
    }
}

#[async_trait]
impl Reviewer for OpenAiReviewer {
    async fn review(&self, segments: &[Segment]) -> Result<Vec<ReviewIssue>> {
        let config = self.chat.config();
        let system = review_prompt(&config.target_language);
        let mut issues = Vec::new();

        for batch in segments.chunks(config.batch_size) {
            let items: Vec<ReviewItem> = batch
                .iter()
                .map(|s| ReviewItem {
                    index: s.index,
                    source: s.source_text.clone(),
                    translation: s.translated_text.clone(),
                })
                .collect();

            let user = serde_json::to_string(&items)?;
            let raw = self.chat
                .complete_json(&system, &user, "translation_review", review_schema())
                .await?;
            issues.extend(parse_review_response(&raw, batch)?);
        }

        info!("Review flagged {} of {} segments", issues.len(), segments.len());
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(index: usize, source: &str, target: &str) -> Segment {
        let mut segment = Segment::new(index, index as f64, index as f64 + 1.0, source);
        segment.translated_text = target.to_string();
        segment
    }

    #[test]
    fn test_flagged_entries_become_issues() {
        let batch = vec![
            translated(0, "Coatings matter.", "Los revestimientos importan."),
            translated(1, "Thanks.", "Gracias."),
        ];
        let raw = r#"{"reviews": [
            {"index": 0, "ok": false, "corrected_text": "Los recubrimientos importan.", "issue": "terminology"},
            {"index": 1, "ok": true, "corrected_text": "", "issue": ""}
        ]}"#;

        let issues = parse_review_response(raw, &batch).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 0);
        assert_eq!(issues[0].translated, "Los revestimientos importan.");
        assert_eq!(issues[0].issue, "terminology");
    }

    #[test]
    fn test_empty_or_unchanged_corrections_ignored() {
        let batch = vec![translated(0, "Hi.", "Hola.")];
        let raw = r#"{"reviews": [
            {"index": 0, "ok": false, "corrected_text": "Hola.", "issue": "none"},
            {"index": 7, "ok": false, "corrected_text": "x", "issue": "unknown"}
        ]}"#;
        assert!(parse_review_response(raw, &batch).unwrap().is_empty());
    }

    #[test]
    fn test_apply_review() {
        let mut segments = vec![translated(0, "a", "uno"), translated(1, "b", "dos")];
        let issues = vec![ReviewIssue {
            index: 1,
            original: "b".to_string(),
            translated: "dos".to_string(),
            corrected: "DOS".to_string(),
            issue: "case".to_string(),
        }];
        apply_review(&mut segments, &issues);
        assert_eq!(segments[0].translated_text, "uno");
        assert_eq!(segments[1].translated_text, "DOS");
    }
}
