use std::path::PathBuf;

use async_trait::async_trait;
use transcribe_domain::{
    is_control_token, AudioArtifact, DomainError, LanguageAligner, LanguageCode,
    TranscriptSegment, TranscriptToken, WordTiming,
};
use transcribe_infra_audio::wav_duration_ms;

use crate::AlignError;

/// Languages written without spaces between words; every character is a word.
pub const CHARACTER_LANGUAGES: &[&str] = &["ja", "zh", "yue"];

/// Word timing taken from the recognizer's own token timestamps.
pub struct TokenAligner {
    language: LanguageCode,
    min_word_duration_ms: u64,
    split_characters: bool,
}

impl TokenAligner {
    pub fn new(language: LanguageCode, min_word_duration_ms: u64) -> Self {
        let split_characters = CHARACTER_LANGUAGES.contains(&language.as_str());
        Self {
            language,
            min_word_duration_ms,
            split_characters,
        }
    }
}

#[async_trait]
impl LanguageAligner for TokenAligner {
    fn language(&self) -> &LanguageCode {
        &self.language
    }

    async fn align(
        &self,
        segments: Vec<TranscriptSegment>,
        artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, DomainError> {
        let path: PathBuf = artifact.path().to_path_buf();
        let duration_ms = tokio::task::spawn_blocking(move || wav_duration_ms(&path))
            .await
            .map_err(|err| DomainError::internal_error(format!("alignment task failed: {err}")))?
            .map_err(|err| DomainError::alignment_failure(format!("audio unreadable: {err}")))?;

        align_with_tokens(
            segments,
            duration_ms,
            self.split_characters,
            self.min_word_duration_ms,
        )
        .map_err(AlignError::into_domain)
    }
}

pub(crate) fn check_segment_bounds(
    segment: &TranscriptSegment,
    duration_ms: u64,
) -> Result<(), AlignError> {
    if segment.start_ms > duration_ms {
        return Err(AlignError::mismatch(format!(
            "segment starting at {} ms lies beyond the audio ({} ms)",
            segment.start_ms, duration_ms
        )));
    }
    Ok(())
}

pub fn align_with_tokens(
    segments: Vec<TranscriptSegment>,
    duration_ms: u64,
    split_characters: bool,
    min_word_duration_ms: u64,
) -> Result<Vec<TranscriptSegment>, AlignError> {
    segments
        .into_iter()
        .map(|mut segment| {
            check_segment_bounds(&segment, duration_ms)?;
            segment.end_ms = segment.end_ms.min(duration_ms).max(segment.start_ms);

            let has_tokens = segment.tokens.iter().any(|t| !is_control_token(&t.text));
            let words = if has_tokens {
                words_from_tokens(&segment.tokens, split_characters)
            } else {
                proportional_words(
                    &segment.text,
                    segment.start_ms,
                    segment.end_ms,
                    split_characters,
                )
            };
            let limit = segment.end_ms;
            segment.words = words
                .into_iter()
                .map(|mut word| {
                    word.start_ms = word.start_ms.min(limit);
                    word.end_ms = word
                        .end_ms
                        .max(word.start_ms.saturating_add(min_word_duration_ms))
                        .min(limit)
                        .max(word.start_ms);
                    word
                })
                .collect();
            refine_bounds(&mut segment);
            Ok(segment)
        })
        .collect()
}

/// Snap the segment to its first and last word.
pub(crate) fn refine_bounds(segment: &mut TranscriptSegment) {
    let Some(first) = segment.words.first() else {
        return;
    };
    let start_ms = first.start_ms;
    let end_ms = segment
        .words
        .iter()
        .map(|w| w.end_ms)
        .max()
        .unwrap_or(start_ms);
    segment.start_ms = start_ms;
    segment.end_ms = end_ms.max(start_ms);
}

struct PendingWord {
    text: String,
    start_ms: u64,
    end_ms: u64,
    confidence_sum: f32,
    pieces: usize,
}

impl PendingWord {
    fn finish(self) -> WordTiming {
        WordTiming {
            word: self.text,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            confidence: self.confidence_sum / self.pieces.max(1) as f32,
        }
    }
}

fn words_from_tokens(tokens: &[TranscriptToken], split_characters: bool) -> Vec<WordTiming> {
    let tokens = tokens
        .iter()
        .filter(|t| !t.text.trim().is_empty() && !is_control_token(&t.text));

    if split_characters {
        return tokens
            .flat_map(|token| {
                let chars: Vec<char> = token.text.chars().filter(|c| !c.is_whitespace()).collect();
                let span = token.end_ms.saturating_sub(token.start_ms);
                let count = chars.len() as u64;
                chars.into_iter().enumerate().map(move |(idx, c)| WordTiming {
                    word: c.to_string(),
                    start_ms: token.start_ms + span * idx as u64 / count,
                    end_ms: token.start_ms + span * (idx as u64 + 1) / count,
                    confidence: token.confidence,
                })
            })
            .collect();
    }

    let mut words = Vec::new();
    let mut pending: Option<PendingWord> = None;
    for token in tokens {
        let starts_word = token.text.starts_with(char::is_whitespace);
        match pending.as_mut() {
            Some(word) if !starts_word => {
                word.text.push_str(token.text.trim_end());
                word.end_ms = word.end_ms.max(token.end_ms);
                word.confidence_sum += token.confidence;
                word.pieces += 1;
            }
            _ => {
                if let Some(done) = pending.take() {
                    words.push(done.finish());
                }
                pending = Some(PendingWord {
                    text: token.text.trim().to_string(),
                    start_ms: token.start_ms,
                    end_ms: token.end_ms,
                    confidence_sum: token.confidence,
                    pieces: 1,
                });
            }
        }
    }
    if let Some(done) = pending {
        words.push(done.finish());
    }
    words
}

/// Spread the words evenly over the segment when the recognizer gave no
/// token timing. Confidence is zero since nothing was measured.
fn proportional_words(
    text: &str,
    start_ms: u64,
    end_ms: u64,
    split_characters: bool,
) -> Vec<WordTiming> {
    let units: Vec<String> = if split_characters {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .map(String::from)
            .collect()
    } else {
        text.split_whitespace().map(str::to_string).collect()
    };
    if units.is_empty() {
        return Vec::new();
    }

    let span = end_ms.saturating_sub(start_ms);
    let count = units.len() as u64;
    units
        .into_iter()
        .enumerate()
        .map(|(idx, word)| WordTiming {
            word,
            start_ms: start_ms + span * idx as u64 / count,
            end_ms: start_ms + span * (idx as u64 + 1) / count,
            confidence: 0.0,
        })
        .collect()
}
