use transcribe_domain::{ComputeProfile, TranscriptToken};

#[cfg(feature = "whisper-runtime")]
mod runtime;

#[cfg(feature = "whisper-runtime")]
pub use runtime::WhisperTranscriptionAdapter;

#[derive(Debug, Clone)]
pub struct WhisperAdapterConfig {
    pub model_path: String,
    /// `auto` (or empty) lets whisper detect the language per file.
    pub language: String,
    pub temperature: f32,
    pub threads: usize,
    pub compute: ComputeProfile,
}

/// A recognizer token before its timing has been reconciled with the segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToken {
    pub text: String,
    pub confidence: f32,
    pub start_hint_ms: Option<u64>,
    pub end_hint_ms: Option<u64>,
}

pub fn resolve_decode_language(configured: &str) -> Option<String> {
    let normalized = configured.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "auto" {
        None
    } else {
        Some(normalized)
    }
}

/// Whisper reports timestamps in 10 ms units; negative means unknown.
pub fn to_ms_10ms_units(raw: i64) -> Option<u64> {
    let raw_u64 = u64::try_from(raw).ok()?;
    raw_u64.checked_mul(10)
}

/// Give every token a monotonic span inside `[start_ms, end_ms]`, using the
/// recognizer's hints where they exist and an even split otherwise.
pub fn shape_tokens(start_ms: u64, end_ms: u64, raw_tokens: &[RawToken]) -> Vec<TranscriptToken> {
    let token_span = if raw_tokens.is_empty() {
        1
    } else {
        (end_ms.saturating_sub(start_ms) / raw_tokens.len() as u64).max(1)
    };

    raw_tokens
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let fallback_start_ms = start_ms.saturating_add(idx as u64 * token_span);
            let fallback_end_ms = fallback_start_ms.saturating_add(token_span).min(end_ms);
            let next_start_hint_ms = raw_tokens.get(idx + 1).and_then(|next| next.start_hint_ms);

            let token_start_ms = raw
                .start_hint_ms
                .unwrap_or(fallback_start_ms)
                .clamp(start_ms, end_ms.max(start_ms));
            let token_end_ms = raw
                .end_hint_ms
                .filter(|end| *end > token_start_ms)
                .or_else(|| next_start_hint_ms.filter(|next| *next > token_start_ms))
                .unwrap_or(fallback_end_ms);

            let min_end = token_start_ms.saturating_add(1);
            let max_end = end_ms.max(min_end);

            TranscriptToken {
                text: raw.text.clone(),
                start_ms: token_start_ms,
                end_ms: token_end_ms.clamp(min_end, max_end),
                confidence: raw.confidence,
            }
        })
        .collect()
}
