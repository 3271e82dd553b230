use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    AudioArtifact, DomainError, LanguageCode, TranscriptSegment, TranscriptionOutput,
    UploadedFile,
};

#[async_trait]
pub trait AudioNormalizerPort: Send + Sync {
    /// `batch_id` tags any scratch file the normalizer has to create.
    async fn normalize(
        &self,
        upload: &UploadedFile,
        batch_id: &str,
    ) -> Result<AudioArtifact, DomainError>;
}

#[async_trait]
pub trait TranscriptionPort: Send + Sync {
    async fn transcribe(&self, artifact: &AudioArtifact)
        -> Result<TranscriptionOutput, DomainError>;
}

#[async_trait]
pub trait AlignmentPort: Send + Sync {
    /// Fails with [`DomainError::UnsupportedLanguage`] when nothing can align `language`.
    async fn load_alignment_resources(
        &self,
        language: &LanguageCode,
    ) -> Result<Arc<dyn LanguageAligner>, DomainError>;
}

#[async_trait]
pub trait LanguageAligner: Send + Sync {
    fn language(&self) -> &LanguageCode;

    async fn align(
        &self,
        segments: Vec<TranscriptSegment>,
        artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, DomainError>;
}
