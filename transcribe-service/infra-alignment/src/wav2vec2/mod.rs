mod model;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use transcribe_domain::{
    AudioArtifact, ComputeDevice, ComputeProfile, DomainError, LanguageAligner, LanguageCode,
    Precision, TranscriptSegment,
};
use transcribe_infra_audio::load_pcm_samples;

use crate::ctc::{
    build_token_sequence, forced_align_viterbi, frame_stride_ms, normalize_audio,
    words_from_path, CtcVocab,
};
use crate::token::{align_with_tokens, check_segment_bounds, refine_bounds, CHARACTER_LANGUAGES};
use crate::{AlignError, Wav2Vec2ModelFiles};

use self::model::{Wav2Vec2ForCtc, Wav2Vec2ModelConfig};

/// Fewest samples the convolutional front end turns into one frame.
const MIN_SEGMENT_SAMPLES: usize = 400;

fn select_device(device: ComputeDevice) -> Result<Device, AlignError> {
    match device {
        ComputeDevice::Cpu => Ok(Device::Cpu),
        ComputeDevice::Cuda { ordinal } => {
            Device::new_cuda(ordinal).map_err(|e| AlignError::runtime("cuda init", e))
        }
    }
}

fn select_dtype(profile: &ComputeProfile) -> DType {
    match (profile.precision, profile.device) {
        (Precision::Float16, ComputeDevice::Cuda { .. }) => DType::F16,
        (Precision::Float32, _) => DType::F32,
        (precision, _) => {
            tracing::debug!(?precision, "precision unavailable for wav2vec2, using f32");
            DType::F32
        }
    }
}

struct Wav2Vec2Engine {
    model: Wav2Vec2ForCtc,
    vocab: CtcVocab,
    frame_stride_ms: f64,
    device: Device,
    dtype: DType,
    sample_rate_hz: u32,
    min_word_duration_ms: u64,
}

impl Wav2Vec2Engine {
    fn emissions(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, AlignError> {
        let normalized = normalize_audio(samples);
        let audio = Tensor::from_vec(normalized, (1, samples.len()), &self.device)
            .and_then(|t| t.to_dtype(self.dtype))
            .map_err(|e| AlignError::runtime("audio tensor", e))?;
        let logits = self
            .model
            .forward(&audio)
            .map_err(|e| AlignError::runtime("forward pass", e))?;
        logits
            .to_dtype(DType::F32)
            .and_then(|t| candle_nn::ops::log_softmax(&t, D::Minus1))
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec2())
            .map_err(|e| AlignError::runtime("log_softmax", e))
    }

    fn align_segment(
        &self,
        segment: TranscriptSegment,
        pcm: &[f32],
        split_characters: bool,
    ) -> Result<TranscriptSegment, AlignError> {
        let to_sample =
            |ms: u64| (ms as usize * self.sample_rate_hz as usize / 1000).min(pcm.len());
        let start = to_sample(segment.start_ms);
        let end = to_sample(segment.end_ms);

        let text = if split_characters {
            segment.text.chars().map(|c| format!("{c} ")).collect::<String>()
        } else {
            segment.text.clone()
        };
        let sequence = build_token_sequence(&text, &self.vocab);
        // text the vocabulary cannot spell keeps the recognizer's token timing
        if !sequence.has_labels() {
            tracing::debug!(text = %segment.text, "segment has no alignable characters");
            let duration_ms = (pcm.len() as u64 * 1000) / self.sample_rate_hz as u64;
            let mut aligned = align_with_tokens(
                vec![segment],
                duration_ms,
                split_characters,
                self.min_word_duration_ms,
            )?;
            return aligned
                .pop()
                .ok_or_else(|| AlignError::mismatch("segment vanished during alignment"));
        }

        if end.saturating_sub(start) < MIN_SEGMENT_SAMPLES {
            return Err(AlignError::mismatch(format!(
                "segment {}..{} ms is too short to align",
                segment.start_ms, segment.end_ms
            )));
        }

        let log_probs = self.emissions(&pcm[start..end])?;
        let needed = sequence.min_frames();
        if log_probs.len() < needed {
            return Err(AlignError::mismatch(format!(
                "transcript needs {needed} frames but the audio has {}",
                log_probs.len()
            )));
        }

        let path = forced_align_viterbi(&log_probs, &sequence.ids);
        let mut segment = segment;
        segment.words = words_from_path(
            &path,
            &sequence,
            &log_probs,
            self.frame_stride_ms,
            segment.start_ms,
        );
        refine_bounds(&mut segment);
        Ok(segment)
    }
}

/// Acoustic forced alignment with a per-language wav2vec2 CTC model.
pub struct Wav2Vec2Aligner {
    language: LanguageCode,
    split_characters: bool,
    engine: Arc<Wav2Vec2Engine>,
}

impl Wav2Vec2Aligner {
    pub fn load(
        language: LanguageCode,
        files: &Wav2Vec2ModelFiles,
        compute: ComputeProfile,
        sample_rate_hz: u32,
        min_word_duration_ms: u64,
    ) -> Result<Self, AlignError> {
        let device = select_device(compute.device)?;
        let dtype = select_dtype(&compute);
        let model_cfg = Wav2Vec2ModelConfig::load(Path::new(&files.config_path))?;
        let vocab = CtcVocab::load(Path::new(&files.vocab_path), model_cfg.pad_token_id)?;
        let stride_ms = frame_stride_ms(&model_cfg.conv_stride, sample_rate_hz);

        let weights =
            std::fs::read(&files.model_path).map_err(|e| AlignError::io("read safetensors", e))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, dtype, &device)
            .map_err(|e| AlignError::runtime("load safetensors", e))?;
        let model = Wav2Vec2ForCtc::load(&model_cfg, vb)
            .map_err(|e| AlignError::runtime("build model", e))?;

        tracing::info!(
            language = %language,
            model_path = %files.model_path,
            layers = model_cfg.num_hidden_layers,
            vocab = model_cfg.vocab_size,
            blank_id = vocab.blank_id(),
            frame_stride_ms = stride_ms,
            ?device,
            ?dtype,
            "wav2vec2 model loaded"
        );

        Ok(Self {
            split_characters: CHARACTER_LANGUAGES.contains(&language.as_str()),
            language,
            engine: Arc::new(Wav2Vec2Engine {
                model,
                vocab,
                frame_stride_ms: stride_ms,
                device,
                dtype,
                sample_rate_hz,
                min_word_duration_ms,
            }),
        })
    }
}

#[async_trait]
impl LanguageAligner for Wav2Vec2Aligner {
    fn language(&self) -> &LanguageCode {
        &self.language
    }

    async fn align(
        &self,
        segments: Vec<TranscriptSegment>,
        artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, DomainError> {
        let path: PathBuf = artifact.path().to_path_buf();
        let engine = self.engine.clone();
        let split_characters = self.split_characters;

        tokio::task::spawn_blocking(move || {
            let pcm = load_pcm_samples(&path)
                .map_err(|e| AlignError::mismatch(format!("audio unreadable: {e}")))?;
            if pcm.sample_rate_hz != engine.sample_rate_hz {
                return Err(AlignError::mismatch(format!(
                    "audio is {} Hz, model expects {} Hz",
                    pcm.sample_rate_hz, engine.sample_rate_hz
                )));
            }
            let duration_ms = pcm.duration_ms();
            segments
                .into_iter()
                .map(|segment| {
                    check_segment_bounds(&segment, duration_ms)?;
                    engine.align_segment(segment, &pcm.samples, split_characters)
                })
                .collect::<Result<Vec<_>, AlignError>>()
        })
        .await
        .map_err(|e| DomainError::internal_error(format!("alignment task failed: {e}")))?
        .map_err(AlignError::into_domain)
    }
}
