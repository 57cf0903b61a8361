use serde::{Deserialize, Serialize};

use crate::segment::Segment;

/// A single word with timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Sentence-level transcription of one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub full_text: String,
    /// End of the last word, in seconds
    pub duration: f64,
    pub language: String,
}

impl Transcript {
    pub fn empty(language: impl Into<String>) -> Self {
        Self {
            segments: Vec::new(),
            full_text: String::new(),
            duration: 0.0,
            language: language.into(),
        }
    }

    pub fn from_words(words: &[TranscriptWord], rules: &GroupingRules, language: impl Into<String>) -> Self {
        if words.is_empty() {
            return Self::empty(language);
        }

        let full_text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
        Self {
            segments: group_into_segments(words, rules),
            full_text,
            duration: words.last().map(|w| w.end).unwrap_or(0.0),
            language: language.into(),
        }
    }
}

/// When to close a sentence segment while grouping words
#[derive(Debug, Clone, Copy)]
pub struct GroupingRules {
    /// Pause before the next word (seconds) that forces a break
    pub max_pause: f64,
    /// Segment length (seconds) that forces a break
    pub max_segment_duration: f64,
}

impl Default for GroupingRules {
    fn default() -> Self {
        Self {
            max_pause: 0.7,
            max_segment_duration: 15.0,
        }
    }
}

fn ends_sentence(text: &str) -> bool {
    matches!(text.chars().last(), Some('.' | '!' | '?'))
}

/// Group timed words into sentence segments, breaking on sentence-final
/// punctuation, long pauses and the maximum segment length.
///
/// A group with no duration is never emitted: its words join the next
/// segment, or the previous one at the end of the transcript.
pub fn group_into_segments(words: &[TranscriptWord], rules: &GroupingRules) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&TranscriptWord> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word);

        let mut should_break = ends_sentence(&word.text);

        if !should_break {
            if let Some(next) = words.get(i + 1) {
                should_break = next.start - word.end > rules.max_pause;
            }
        }

        if !should_break {
            should_break = word.end - current[0].start >= rules.max_segment_duration;
        }

        if should_break && has_duration(&current) {
            segments.push(words_to_segment(segments.len(), &current));
            current.clear();
        }
    }

    if !current.is_empty() {
        if has_duration(&current) {
            segments.push(words_to_segment(segments.len(), &current));
        } else if let Some(last) = segments.last_mut() {
            for word in &current {
                last.source_text.push(' ');
                last.source_text.push_str(&word.text);
                last.end_time = last.end_time.max(word.end);
            }
        }
    }

    segments
}

fn has_duration(words: &[&TranscriptWord]) -> bool {
    match (words.first(), words.last()) {
        (Some(first), Some(last)) => last.end > first.start,
        _ => false,
    }
}

fn words_to_segment(index: usize, words: &[&TranscriptWord]) -> Segment {
    let text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
    Segment::new(index, words[0].start, words[words.len() - 1].end, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(start: f64, end: f64, text: &str) -> TranscriptWord {
        TranscriptWord { start, end, text: text.to_string() }
    }

    #[test]
    fn test_breaks_on_punctuation() {
        let words = vec![
            word(0.0, 0.3, "Welcome"),
            word(0.35, 0.6, "back."),
            word(0.7, 1.0, "Today"),
            word(1.05, 1.4, "we"),
            word(1.45, 1.9, "start!"),
        ];
        let segments = group_into_segments(&words, &GroupingRules::default());

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].source_text, "Welcome back.");
        assert_eq!(segments[0].start_time, 0.0);
        assert_eq!(segments[0].end_time, 0.6);
        assert_eq!(segments[1].index, 1);
        assert_eq!(segments[1].source_text, "Today we start!");
    }

    #[test]
    fn test_breaks_on_long_pause() {
        let words = vec![word(0.0, 0.5, "safety"), word(1.5, 2.0, "first")];
        let segments = group_into_segments(&words, &GroupingRules::default());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].source_text, "first");
    }

    #[test]
    fn test_breaks_on_max_duration() {
        let rules = GroupingRules {
            max_pause: 10.0,
            max_segment_duration: 2.0,
        };
        let words = vec![
            word(0.0, 1.0, "one"),
            word(1.1, 2.1, "two"),
            word(2.2, 3.0, "three"),
        ];
        let segments = group_into_segments(&words, &rules);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].source_text, "one two");
        assert_eq!(segments[1].source_text, "three");
    }

    #[test]
    fn test_transcript_from_words() {
        let words = vec![word(0.2, 0.5, "Hello"), word(0.6, 1.2, "crew.")];
        let transcript = Transcript::from_words(&words, &GroupingRules::default(), "en");
        assert_eq!(transcript.full_text, "Hello crew.");
        assert_eq!(transcript.duration, 1.2);
        assert_eq!(transcript.segments.len(), 1);
    }

    #[test]
    fn test_zero_length_word_joins_next_segment() {
        let words = vec![word(0.0, 0.5, "Hello."), word(1.2, 1.2, "Okay."), word(2.0, 2.5, "Bye.")];
        let segments = group_into_segments(&words, &GroupingRules::default());

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[1].start_time, segments[1].end_time), (1.2, 2.5));
        assert_eq!(segments[1].source_text, "Okay. Bye.");
        assert_eq!(segments[1].index, 1);
        assert!(crate::segment::Timeline::new(segments, 3.0).validate().is_ok());
    }

    #[test]
    fn test_trailing_zero_length_word_joins_previous_segment() {
        let words = vec![word(0.0, 0.5, "Hello."), word(1.2, 1.2, "Okay.")];
        let segments = group_into_segments(&words, &GroupingRules::default());

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].source_text, "Hello. Okay.");
        assert_eq!(segments[0].end_time, 1.2);

        let only_zero = vec![word(1.0, 1.0, "Mm.")];
        assert!(group_into_segments(&only_zero, &GroupingRules::default()).is_empty());
    }

    #[test]
    fn test_empty_words() {
        let transcript = Transcript::from_words(&[], &GroupingRules::default(), "en");
        assert!(transcript.segments.is_empty());
        assert_eq!(transcript.duration, 0.0);
    }
}
