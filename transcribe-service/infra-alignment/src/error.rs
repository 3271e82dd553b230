use thiserror::Error;
use transcribe_domain::DomainError;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("{0}")]
    Mismatch(String),
}

impl AlignError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    #[cfg_attr(not(feature = "wav2vec2-runtime"), allow(dead_code))]
    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch(message.into())
    }

    /// Audio/transcript disagreements are the caller's problem; everything
    /// else is ours.
    pub fn into_domain(self) -> DomainError {
        match self {
            AlignError::Mismatch(message) => DomainError::alignment_failure(message),
            other => DomainError::internal_error(other.to_string()),
        }
    }
}
