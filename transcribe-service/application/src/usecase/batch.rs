use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use transcribe_domain::{
    AlignmentPort, AudioArtifact, AudioNormalizerPort, BatchResult, DomainError, FileOutcome,
    FileResult, TranscriptionPort, UploadedFile,
};

use crate::{ApplicationError, TranscribeBatchRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first failed file aborts the batch.
    FailFast,
    /// Failed files are reported next to the successful ones.
    Partial,
}

#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub failure_policy: FailurePolicy,
    pub max_concurrent_files: usize,
    pub file_timeout: Duration,
    pub batch_timeout: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::FailFast,
            max_concurrent_files: 2,
            file_timeout: Duration::from_secs(600),
            batch_timeout: Duration::from_secs(3_600),
        }
    }
}

#[async_trait]
pub trait BatchTranscriptionUseCase: Send + Sync {
    async fn transcribe_batch(
        &self,
        request: TranscribeBatchRequest,
    ) -> Result<BatchResult, ApplicationError>;
}

/// Drives every upload through normalize, transcribe and align, keeping the
/// results in upload order.
pub struct BatchTranscriptionUseCaseImpl {
    normalizer: Arc<dyn AudioNormalizerPort>,
    transcription: Arc<dyn TranscriptionPort>,
    alignment: Arc<dyn AlignmentPort>,
    policy: BatchPolicy,
}

impl BatchTranscriptionUseCaseImpl {
    pub fn new(
        normalizer: Arc<dyn AudioNormalizerPort>,
        transcription: Arc<dyn TranscriptionPort>,
        alignment: Arc<dyn AlignmentPort>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            normalizer,
            transcription,
            alignment,
            policy,
        }
    }

    async fn run_batch(
        &self,
        batch_id: &str,
        uploads: Vec<UploadedFile>,
    ) -> Result<Vec<FileOutcome>, ApplicationError> {
        let total = uploads.len();
        let mut in_flight = stream::iter(uploads.into_iter().enumerate())
            .map(|(index, upload)| self.process_file(index, upload, batch_id))
            .buffered(self.policy.max_concurrent_files.max(1));

        let mut files = Vec::with_capacity(total);
        while let Some((filename, outcome)) = in_flight.next().await {
            match outcome {
                Ok(result) => files.push(FileOutcome::Completed(result)),
                Err(error) => match self.policy.failure_policy {
                    FailurePolicy::FailFast => {
                        tracing::warn!(
                            filename = %filename,
                            kind = error.kind().as_str(),
                            error = %error,
                            "file failed, aborting batch"
                        );
                        // dropping the stream cancels the remaining files
                        return Err(error.into());
                    }
                    FailurePolicy::Partial => {
                        tracing::warn!(
                            filename = %filename,
                            kind = error.kind().as_str(),
                            error = %error,
                            "file failed, continuing batch"
                        );
                        files.push(FileOutcome::Failed { filename, error });
                    }
                },
            }
        }
        Ok(files)
    }

    async fn process_file(
        &self,
        index: usize,
        upload: UploadedFile,
        batch_id: &str,
    ) -> (String, Result<FileResult, DomainError>) {
        let span = tracing::debug_span!("file", index, filename = %upload.filename);
        let limit = self.policy.file_timeout;
        let outcome = tokio::time::timeout(limit, self.run_file(&upload, batch_id))
            .instrument(span)
            .await
            .unwrap_or_else(|_| {
                Err(DomainError::timeout(
                    format!("file `{}`", upload.filename),
                    limit.as_secs(),
                ))
            });
        (upload.filename, outcome)
    }

    async fn run_file(
        &self,
        upload: &UploadedFile,
        batch_id: &str,
    ) -> Result<FileResult, DomainError> {
        let artifact = self.normalizer.normalize(upload, batch_id).await?;
        let outcome = self.transcribe_and_align(&upload.filename, &artifact).await;
        release_artifact(artifact, &upload.filename);
        outcome
    }

    async fn transcribe_and_align(
        &self,
        filename: &str,
        artifact: &AudioArtifact,
    ) -> Result<FileResult, DomainError> {
        let output = self.transcription.transcribe(artifact).await?;
        tracing::debug!(
            language = %output.language,
            segment_count = output.segments.len(),
            "transcription completed"
        );

        let aligner = self
            .alignment
            .load_alignment_resources(&output.language)
            .await?;
        let transcript = aligner.align(output.segments, artifact).await?;
        tracing::debug!(
            word_count = transcript.iter().map(|s| s.words.len()).sum::<usize>(),
            "alignment completed"
        );

        Ok(FileResult {
            filename: filename.to_string(),
            language: output.language,
            transcript,
        })
    }
}

fn release_artifact(artifact: AudioArtifact, filename: &str) {
    if !artifact.is_scratch() {
        return;
    }
    let path = artifact.path().display().to_string();
    match artifact.release() {
        Ok(()) => tracing::debug!(filename, path = %path, "scratch artifact released"),
        Err(err) => tracing::warn!(filename, error = %err, "scratch artifact cleanup failed"),
    }
}

#[async_trait]
impl BatchTranscriptionUseCase for BatchTranscriptionUseCaseImpl {
    async fn transcribe_batch(
        &self,
        request: TranscribeBatchRequest,
    ) -> Result<BatchResult, ApplicationError> {
        request
            .validate()
            .map_err(|_| ApplicationError::Validation("at least one file is required".into()))?;

        let batch_id = Uuid::new_v4().to_string();
        let file_count = request.uploads.len();
        let span = tracing::info_span!("batch", batch_id = %batch_id, file_count);

        async {
            tracing::info!(
                max_concurrent_files = self.policy.max_concurrent_files,
                failure_policy = ?self.policy.failure_policy,
                "starting batch transcription"
            );
            let limit = self.policy.batch_timeout;
            let files = tokio::time::timeout(limit, self.run_batch(&batch_id, request.uploads))
                .await
                .map_err(|_| DomainError::timeout("batch", limit.as_secs()))??;

            let failed = files.iter().filter(|f| !f.is_completed()).count();
            tracing::info!(
                completed = files.len() - failed,
                failed,
                "batch transcription completed"
            );
            Ok::<_, ApplicationError>(BatchResult {
                batch_id: batch_id.clone(),
                files,
            })
        }
        .instrument(span)
        .await
    }
}
