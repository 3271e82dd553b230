//! CTC forced alignment over per-frame log-probabilities.
//!
//! The state sequence interleaves blanks with labels:
//! `blank c1 blank c2 blank | blank c3 blank ...`, so every odd state is a
//! label and every even state is a blank.

use std::collections::HashMap;
use std::path::Path;

use transcribe_domain::WordTiming;

use crate::AlignError;

pub const WORD_SEPARATOR: char = '|';

#[derive(Debug, Clone)]
pub struct CtcVocab {
    ids: HashMap<char, usize>,
    blank_id: usize,
    word_sep_id: usize,
}

impl CtcVocab {
    pub fn new(ids: HashMap<char, usize>, blank_id: usize) -> Self {
        let word_sep_id = ids.get(&WORD_SEPARATOR).copied().unwrap_or(blank_id);
        Self {
            ids,
            blank_id,
            word_sep_id,
        }
    }

    /// Read a HuggingFace `vocab.json`. Multi-character entries such as
    /// `<pad>` or `<s>` cannot occur in a transcript and are skipped.
    pub fn load(path: &Path, blank_id: usize) -> Result<Self, AlignError> {
        let data = std::fs::read_to_string(path).map_err(|e| AlignError::io("read vocab", e))?;
        let raw: HashMap<String, usize> =
            serde_json::from_str(&data).map_err(|e| AlignError::json("parse vocab", e))?;

        let ids = raw
            .into_iter()
            .filter_map(|(key, id)| {
                let mut chars = key.chars();
                let c = chars.next()?;
                chars.next().is_none().then_some((c, id))
            })
            .collect();
        Ok(Self::new(ids, blank_id))
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    fn id(&self, c: char) -> Option<usize> {
        self.ids.get(&c).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    pub ids: Vec<usize>,
    /// Word index for character states; `None` for blanks and separators.
    pub owners: Vec<Option<usize>>,
    /// Transcript words as written, in order.
    pub words: Vec<String>,
}

impl TokenSequence {
    /// Fewest frames a CTC path needs: one per label, plus a blank between
    /// repeated labels.
    pub fn min_frames(&self) -> usize {
        let labels: Vec<usize> = self.ids.iter().skip(1).step_by(2).copied().collect();
        let repeats = labels.windows(2).filter(|pair| pair[0] == pair[1]).count();
        labels.len() + repeats
    }

    pub fn has_labels(&self) -> bool {
        self.owners.iter().any(Option::is_some)
    }
}

/// Characters missing from the vocabulary (punctuation, digits) are dropped
/// from the state sequence but their word is kept.
pub fn build_token_sequence(transcript: &str, vocab: &CtcVocab) -> TokenSequence {
    let mut ids = vec![vocab.blank_id];
    let mut owners = vec![None];
    let mut words = Vec::new();

    for (word_index, word) in transcript.split_whitespace().enumerate() {
        if word_index > 0 {
            ids.extend([vocab.word_sep_id, vocab.blank_id]);
            owners.extend([None, None]);
        }
        for c in word.chars().flat_map(char::to_lowercase) {
            if let Some(id) = vocab.id(c) {
                ids.extend([id, vocab.blank_id]);
                owners.extend([Some(word_index), None]);
            }
        }
        words.push(word.to_string());
    }

    TokenSequence { ids, owners, words }
}

/// Most likely monotonic path through `tokens`, as `(state, frame)` pairs,
/// one per frame.
pub fn forced_align_viterbi(log_probs: &[Vec<f32>], tokens: &[usize]) -> Vec<(usize, usize)> {
    let t_len = log_probs.len();
    let s_len = tokens.len();
    if t_len == 0 || s_len == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![f32::NEG_INFINITY; s_len]; t_len];
    let mut bp = vec![vec![0usize; s_len]; t_len];

    dp[0][0] = log_probs[0][tokens[0]];
    if s_len > 1 {
        dp[0][1] = log_probs[0][tokens[1]];
    }

    for t in 1..t_len {
        for s in 0..s_len {
            let mut best = dp[t - 1][s];
            let mut from = s;
            if s >= 1 && dp[t - 1][s - 1] > best {
                best = dp[t - 1][s - 1];
                from = s - 1;
            }
            if s >= 2 && tokens[s] != tokens[s - 2] && dp[t - 1][s - 2] > best {
                best = dp[t - 1][s - 2];
                from = s - 2;
            }
            dp[t][s] = best + log_probs[t][tokens[s]];
            bp[t][s] = from;
        }
    }

    let mut s = s_len - 1;
    if s_len >= 2 && dp[t_len - 1][s_len - 2] > dp[t_len - 1][s_len - 1] {
        s = s_len - 2;
    }

    let mut path = vec![(s, t_len - 1)];
    for t in (1..t_len).rev() {
        s = bp[t][s];
        path.push((s, t - 1));
    }
    path.reverse();
    path
}

#[derive(Debug, Clone, Copy)]
struct FrameSpan {
    first: usize,
    last: usize,
    log_prob_sum: f32,
    frames: usize,
}

/// Turn a Viterbi path into word timings. Times are `offset_ms` plus frame
/// position; confidence is `exp(mean log-prob)` over the word's frames.
/// Words with no aligned character get a zero-length span at the previous
/// word's end.
pub fn words_from_path(
    path: &[(usize, usize)],
    sequence: &TokenSequence,
    log_probs: &[Vec<f32>],
    stride_ms: f64,
    offset_ms: u64,
) -> Vec<WordTiming> {
    let mut spans: Vec<Option<FrameSpan>> = vec![None; sequence.words.len()];
    for &(state, frame) in path {
        let Some(word) = sequence.owners[state] else {
            continue;
        };
        let log_prob = log_probs[frame][sequence.ids[state]];
        match &mut spans[word] {
            Some(span) => {
                span.last = frame;
                span.log_prob_sum += log_prob;
                span.frames += 1;
            }
            empty => {
                *empty = Some(FrameSpan {
                    first: frame,
                    last: frame,
                    log_prob_sum: log_prob,
                    frames: 1,
                })
            }
        }
    }

    let frame_ms = |frame: usize| offset_ms + (frame as f64 * stride_ms).round() as u64;
    let mut cursor_ms = offset_ms;
    sequence
        .words
        .iter()
        .zip(spans)
        .map(|(word, span)| match span {
            Some(span) => {
                let start_ms = frame_ms(span.first);
                let end_ms = frame_ms(span.last + 1);
                cursor_ms = end_ms;
                WordTiming {
                    word: word.clone(),
                    start_ms,
                    end_ms,
                    confidence: (span.log_prob_sum / span.frames as f32).exp(),
                }
            }
            None => WordTiming {
                word: word.clone(),
                start_ms: cursor_ms,
                end_ms: cursor_ms,
                confidence: 0.0,
            },
        })
        .collect()
}

/// Milliseconds covered by one output frame of the convolutional front end.
pub fn frame_stride_ms(conv_stride: &[usize], sample_rate_hz: u32) -> f64 {
    let stride_samples: usize = conv_stride.iter().product();
    stride_samples as f64 / sample_rate_hz as f64 * 1000.0
}

/// Zero mean, unit variance, as the feature extractor was trained on.
pub fn normalize_audio(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = var.sqrt().max(1e-7);
    samples
        .iter()
        .map(|&x| ((x as f64 - mean) / std) as f32)
        .collect()
}
