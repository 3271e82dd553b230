use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("upload `{filename}` is unreadable: {reason}")]
    UnreadableUpload { filename: String, reason: String },

    #[error("temporary audio storage unavailable: {0}")]
    ResourceAllocation(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailure(String),

    #[error("no alignment resources for language `{0}`")]
    UnsupportedLanguage(String),

    #[error("alignment failed: {0}")]
    AlignmentFailure(String),

    #[error("{scope} exceeded its {seconds}s budget")]
    Timeout { scope: String, seconds: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnreadableUpload,
    ResourceAllocation,
    TranscriptionFailure,
    UnsupportedLanguage,
    AlignmentFailure,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnreadableUpload => "unreadable_upload",
            ErrorKind::ResourceAllocation => "resource_allocation",
            ErrorKind::TranscriptionFailure => "transcription_failure",
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::AlignmentFailure => "alignment_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl DomainError {
    pub fn unreadable_upload(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreadableUpload {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn resource_allocation(message: impl Into<String>) -> Self {
        Self::ResourceAllocation(message.into())
    }

    pub fn transcription_failure(message: impl Into<String>) -> Self {
        Self::TranscriptionFailure(message.into())
    }

    pub fn unsupported_language(language: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(language.into())
    }

    pub fn alignment_failure(message: impl Into<String>) -> Self {
        Self::AlignmentFailure(message.into())
    }

    pub fn timeout(scope: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            scope: scope.into(),
            seconds,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::UnreadableUpload { .. } => ErrorKind::UnreadableUpload,
            DomainError::ResourceAllocation(_) => ErrorKind::ResourceAllocation,
            DomainError::TranscriptionFailure(_) => ErrorKind::TranscriptionFailure,
            DomainError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            DomainError::AlignmentFailure(_) => ErrorKind::AlignmentFailure,
            DomainError::Timeout { .. } => ErrorKind::Timeout,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            DomainError::unsupported_language("xx").kind(),
            ErrorKind::UnsupportedLanguage
        );
        assert_eq!(DomainError::timeout("file `a.wav`", 30).kind().as_str(), "timeout");
    }

    #[test]
    fn messages_name_the_failing_input() {
        let err = DomainError::unreadable_upload("clip.mp3", "empty upload");
        assert_eq!(err.to_string(), "upload `clip.mp3` is unreadable: empty upload");
    }
}
