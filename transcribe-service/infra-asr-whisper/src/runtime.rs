use std::sync::Arc;

use async_trait::async_trait;
use transcribe_domain::{
    is_control_token, AudioArtifact, ComputeDevice, DomainError, LanguageCode, TranscriptSegment,
    TranscriptionOutput, TranscriptionPort,
};
use transcribe_infra_audio::load_pcm_samples;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use crate::{
    resolve_decode_language, shape_tokens, to_ms_10ms_units, RawToken,
    WhisperAdapterConfig,
};

/// whisper.cpp behind a process-wide context. Each call decodes on its own
/// state, so concurrent files never contend on a lock.
pub struct WhisperTranscriptionAdapter {
    config: Arc<WhisperAdapterConfig>,
    context: Arc<WhisperContext>,
}

impl WhisperTranscriptionAdapter {
    pub fn new(config: WhisperAdapterConfig) -> Result<Self, DomainError> {
        let mut context_params = WhisperContextParameters::default();
        match config.compute.device {
            ComputeDevice::Cuda { ordinal } => {
                context_params.use_gpu = true;
                context_params.gpu_device = ordinal as i32;
            }
            ComputeDevice::Cpu => context_params.use_gpu = false,
        }

        let context = WhisperContext::new_with_params(&config.model_path, context_params)
            .map_err(|err| {
                DomainError::internal_error(format!(
                    "failed to load whisper model {}: {err}",
                    config.model_path
                ))
            })?;

        tracing::info!(
            model_path = %config.model_path,
            device = ?config.compute.device,
            precision = ?config.compute.precision,
            threads = config.threads,
            "whisper model loaded"
        );

        Ok(Self {
            config: Arc::new(config),
            context: Arc::new(context),
        })
    }
}

#[async_trait]
impl TranscriptionPort for WhisperTranscriptionAdapter {
    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<TranscriptionOutput, DomainError> {
        let path = artifact.path().to_path_buf();
        let config = self.config.clone();
        let context = self.context.clone();

        tokio::task::spawn_blocking(move || {
            let pcm = load_pcm_samples(&path)
                .map_err(|err| DomainError::transcription_failure(err.to_string()))?;
            if pcm.samples.is_empty() {
                return Err(DomainError::transcription_failure("audio has no samples"));
            }
            run_full(&context, &config, &pcm.samples)
        })
        .await
        .map_err(|err| DomainError::internal_error(format!("whisper task failed: {err}")))?
    }
}

fn run_full(
    context: &WhisperContext,
    config: &WhisperAdapterConfig,
    samples: &[f32],
) -> Result<TranscriptionOutput, DomainError> {
    let mut state = context.create_state().map_err(|err| {
        DomainError::internal_error(format!("failed to create whisper state: {err}"))
    })?;

    let decode_language = resolve_decode_language(&config.language);
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_n_threads(config.threads as i32);
    params.set_language(Some(decode_language.as_deref().unwrap_or("auto")));
    params.set_no_timestamps(false);
    params.set_token_timestamps(true);
    params.set_split_on_word(true);
    params.set_temperature(config.temperature);
    params.set_single_segment(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_progress(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|err| DomainError::transcription_failure(format!("whisper decode failed: {err}")))?;

    let language = match decode_language {
        Some(code) => LanguageCode::parse(&code).map_err(|_| {
            DomainError::transcription_failure(format!(
                "configured default_language `{code}` is not a language code"
            ))
        })?,
        None => detected_language(&state)?,
    };
    let segments = collect_segments(&state);

    tracing::debug!(
        language = %language,
        segment_count = segments.len(),
        "whisper decode completed"
    );

    Ok(TranscriptionOutput { language, segments })
}

fn detected_language(state: &WhisperState) -> Result<LanguageCode, DomainError> {
    let lang_id = state.full_lang_id_from_state();
    let code = whisper_rs::get_lang_str(lang_id).unwrap_or("");
    LanguageCode::parse(code).map_err(|_| {
        DomainError::transcription_failure("spoken language could not be detected")
    })
}

fn collect_segments(state: &WhisperState) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    for idx in 0..state.full_n_segments() {
        let Some(segment) = state.get_segment(idx) else {
            continue;
        };
        let start_ms = to_ms_10ms_units(segment.start_timestamp()).unwrap_or(0);
        let end_ms = to_ms_10ms_units(segment.end_timestamp())
            .unwrap_or(start_ms)
            .max(start_ms);
        let text = segment
            .to_str_lossy()
            .map(|cow| cow.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        let mut raw_tokens = Vec::new();
        for token_idx in 0..segment.n_tokens().max(0) {
            let Some(token) = segment.get_token(token_idx) else {
                continue;
            };
            let token_text = token
                .to_str_lossy()
                .map(|cow| cow.to_string())
                .unwrap_or_default();
            if token_text.trim().is_empty() || is_control_token(&token_text) {
                continue;
            }
            let data = token.token_data();
            raw_tokens.push(RawToken {
                text: token_text,
                confidence: token.token_probability(),
                start_hint_ms: to_ms_10ms_units(data.t_dtw).or_else(|| to_ms_10ms_units(data.t0)),
                end_hint_ms: to_ms_10ms_units(data.t1),
            });
        }

        let mut entry = TranscriptSegment::new(text, start_ms, end_ms);
        entry.tokens = shape_tokens(start_ms, end_ms, &raw_tokens);
        segments.push(entry);
    }
    segments
}
