use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// ISO-639 language code as reported by the recognizer, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_ascii_lowercase();
        let valid_length = (2..=3).contains(&normalized.len());
        if !valid_length || !normalized.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(DomainError::internal_error(format!(
                "`{raw}` is not a valid language code"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file received by the transport layer. `location` is owned by the
/// transport and outlives the pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub location: PathBuf,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            location: location.into(),
        }
    }
}

/// Timestamp, language and end-of-text markers such as `[_BEG_]` or `<|en|>`.
pub fn is_control_token(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with("[_") && trimmed.ends_with(']'))
        || (trimmed.starts_with("<|") && trimmed.ends_with("|>"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptToken {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(default)]
    pub tokens: Vec<TranscriptToken>,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
            tokens: Vec::new(),
            words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutput {
    pub language: LanguageCode,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub filename: String,
    pub language: LanguageCode,
    pub transcript: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Completed(FileResult),
    Failed { filename: String, error: DomainError },
}

impl FileOutcome {
    pub fn filename(&self) -> &str {
        match self {
            FileOutcome::Completed(result) => &result.filename,
            FileOutcome::Failed { filename, .. } => filename,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, FileOutcome::Completed(_))
    }
}

/// Per-file outcomes in the same order as the uploads they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub batch_id: String,
    pub files: Vec<FileOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeDevice {
    Cpu,
    Cuda { ordinal: usize },
}

impl ComputeDevice {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, ComputeDevice::Cuda { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Int8,
    Float16,
    Float32,
}

/// Inference placement, resolved once at startup and shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeProfile {
    pub device: ComputeDevice,
    pub precision: Precision,
}

impl Default for ComputeProfile {
    fn default() -> Self {
        Self {
            device: ComputeDevice::Cpu,
            precision: Precision::Float32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_tokens_are_recognized() {
        assert!(is_control_token("[_BEG_]"));
        assert!(is_control_token("[_TT_150]"));
        assert!(is_control_token("<|endoftext|>"));
        assert!(!is_control_token(" hello"));
        assert!(!is_control_token("[music"));
    }

    #[test]
    fn language_code_is_normalized() {
        let code = LanguageCode::parse(" EN ").expect("valid code");
        assert_eq!(code.as_str(), "en");
        assert_eq!(LanguageCode::parse("yue").expect("valid code").as_str(), "yue");
    }

    #[test]
    fn language_code_rejects_garbage() {
        assert!(LanguageCode::parse("").is_err());
        assert!(LanguageCode::parse("english").is_err());
        assert!(LanguageCode::parse("e1").is_err());
    }

    #[test]
    fn language_code_serializes_as_plain_string() {
        let code = LanguageCode::parse("fr").expect("valid code");
        assert_eq!(serde_json::to_string(&code).expect("json"), "\"fr\"");
        let parsed: LanguageCode = serde_json::from_str("\"DE\"").expect("json");
        assert_eq!(parsed.as_str(), "de");
    }
}
