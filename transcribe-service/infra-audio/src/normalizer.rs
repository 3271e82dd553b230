use std::path::{Path, PathBuf};

use async_trait::async_trait;
use transcribe_domain::{AudioArtifact, AudioNormalizerPort, DomainError, ScratchFile, UploadedFile};

use crate::decode::decode_to_mono;
use crate::resample::resample;
use crate::sniff::{is_canonical_wav, sniff_media};
use crate::wav::write_canonical_wav;
use crate::NormalizeError;

#[derive(Debug, Clone)]
pub struct AudioNormalizerConfig {
    pub target_sample_rate_hz: u32,
    /// Where scratch files go; the OS temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for AudioNormalizerConfig {
    fn default() -> Self {
        Self {
            target_sample_rate_hz: 16_000,
            scratch_dir: None,
        }
    }
}

/// Turns an upload into a canonical WAV artifact: passes canonical WAV
/// through untouched, transcodes everything else into a scratch file.
pub struct AudioNormalizer {
    config: AudioNormalizerConfig,
}

impl AudioNormalizer {
    pub fn new(config: AudioNormalizerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AudioNormalizerPort for AudioNormalizer {
    async fn normalize(
        &self,
        upload: &UploadedFile,
        batch_id: &str,
    ) -> Result<AudioArtifact, DomainError> {
        let bytes = tokio::fs::read(&upload.location)
            .await
            .map_err(|e| NormalizeError::Read(e).into_domain(&upload.filename))?;

        let config = self.config.clone();
        let location = upload.location.clone();
        let batch_id = batch_id.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            normalize_bytes(bytes, &location, &batch_id, &config)
        })
        .await
        .map_err(|e| DomainError::internal_error(format!("normalizer task failed: {e}")))?;

        match outcome {
            Ok(artifact) => {
                tracing::debug!(
                    filename = %upload.filename,
                    scratch = artifact.is_scratch(),
                    path = %artifact.path().display(),
                    "upload normalized"
                );
                Ok(artifact)
            }
            Err(err) => {
                tracing::warn!(filename = %upload.filename, error = %err, "normalization failed");
                Err(err.into_domain(&upload.filename))
            }
        }
    }
}

fn normalize_bytes(
    bytes: Vec<u8>,
    location: &Path,
    batch_id: &str,
    config: &AudioNormalizerConfig,
) -> Result<AudioArtifact, NormalizeError> {
    let media = sniff_media(&bytes)?;
    if media.is_wav() && is_canonical_wav(&bytes, config.target_sample_rate_hz) {
        return Ok(AudioArtifact::pass_through(location));
    }

    tracing::debug!(mime = media.mime, "transcoding upload");
    let decoded = decode_to_mono(bytes, media.extension)?;
    let samples = resample(
        &decoded.samples,
        decoded.sample_rate_hz,
        config.target_sample_rate_hz,
    )?;

    let mut builder = tempfile::Builder::new();
    let prefix = format!("transcribe-{batch_id}-");
    builder.prefix(&prefix).suffix(".wav");
    let named = match &config.scratch_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(NormalizeError::Scratch)?;

    // the path is deleted on drop if encoding fails below
    let (file, path) = named.into_parts();
    write_canonical_wav(file, &samples, config.target_sample_rate_hz)?;
    Ok(AudioArtifact::Scratch(ScratchFile::new(path)))
}
