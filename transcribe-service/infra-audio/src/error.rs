use thiserror::Error;
use transcribe_domain::DomainError;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to read upload: {0}")]
    Read(#[source] std::io::Error),
    #[error("upload is empty")]
    Empty,
    #[error("content type could not be recognized")]
    Unrecognized,
    #[error("unsupported media type `{0}`")]
    UnsupportedMedia(&'static str),
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("no audio track found")]
    NoAudioTrack,
    #[error("no audio samples decoded")]
    NoSamples,
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("scratch file unavailable: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("wav encoding failed: {0}")]
    Encode(#[source] hound::Error),
}

impl NormalizeError {
    pub fn into_domain(self, filename: &str) -> DomainError {
        match self {
            NormalizeError::Scratch(_) | NormalizeError::Encode(_) => {
                DomainError::resource_allocation(self.to_string())
            }
            NormalizeError::Resample(_) => DomainError::internal_error(self.to_string()),
            _ => DomainError::unreadable_upload(filename, self.to_string()),
        }
    }
}
