use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use axum::Router;
use tokio::net::TcpListener;
use transcribe_application::{
    BatchPolicy, BatchTranscriptionUseCase, BatchTranscriptionUseCaseImpl, FailurePolicy,
};
use transcribe_configuration::{AppConfig, BatchConfig, FailurePolicy as FailurePolicySetting};
use transcribe_domain::{AlignmentPort, AudioNormalizerPort, ComputeProfile, TranscriptionPort};
use transcribe_http_server::{create_app_routes, AppState};
use transcribe_infra_alignment::{AlignmentRegistry, AlignmentRegistryConfig, Wav2Vec2ModelFiles};
use transcribe_infra_audio::{AudioNormalizer, AudioNormalizerConfig};
#[cfg(feature = "whisper-runtime")]
use transcribe_infra_asr_whisper::{WhisperAdapterConfig, WhisperTranscriptionAdapter};

use crate::resolve_compute_profile;

pub async fn build_and_run(config: AppConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run().await
}

pub struct Application {
    pub config: AppConfig,
    pub compute: ComputeProfile,
    pub state: AppState,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        log_runtime_features();
        let compute = resolve_compute_profile(&config.service.compute);
        let transcription = build_transcription(&config, compute)?;
        Self::with_transcription(config, compute, transcription).await
    }

    /// Wire the normalizer, alignment registry and batch use case around an
    /// already loaded recognizer.
    pub async fn with_transcription(
        config: AppConfig,
        compute: ComputeProfile,
        transcription: Arc<dyn TranscriptionPort>,
    ) -> Result<Self, Error> {
        let scratch_dir = config.service.audio.scratch_dir.as_ref().map(PathBuf::from);

        let normalizer: Arc<dyn AudioNormalizerPort> =
            Arc::new(AudioNormalizer::new(AudioNormalizerConfig {
                target_sample_rate_hz: config.service.audio.target_sample_rate_hz,
                scratch_dir: scratch_dir.clone(),
            }));

        let registry = Arc::new(AlignmentRegistry::new(registry_config(&config, compute)));
        registry
            .preload(&config.service.alignment.preload)
            .await
            .map_err(|err| anyhow!("alignment preload failed: {err}"))?;
        let alignment: Arc<dyn AlignmentPort> = registry;

        let policy = batch_policy(&config.service.batch);
        tracing::info!(
            failure_policy = ?policy.failure_policy,
            max_concurrent_files = policy.max_concurrent_files,
            file_timeout_secs = policy.file_timeout.as_secs(),
            batch_timeout_secs = policy.batch_timeout.as_secs(),
            "batch policy configured"
        );
        let usecase: Arc<dyn BatchTranscriptionUseCase> = Arc::new(
            BatchTranscriptionUseCaseImpl::new(normalizer, transcription, alignment, policy),
        );

        let mut state = AppState::new(usecase);
        if let Some(dir) = scratch_dir {
            state = state.with_spool_root(dir);
        }

        Ok(Self {
            config,
            compute,
            state,
        })
    }

    pub fn router(&self) -> Router {
        create_app_routes(self.state.clone(), &self.config.server)
    }

    pub async fn run(self) -> Result<(), Error> {
        let address = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        tracing::info!(
            address = %address,
            max_upload_bytes = self.config.server.max_upload_bytes,
            "starting transcribe http server"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| anyhow!("transcribe http server failed: {err}"))?;

        tracing::info!("transcribe http server stopped");
        Ok(())
    }
}

pub fn batch_policy(config: &BatchConfig) -> BatchPolicy {
    BatchPolicy {
        failure_policy: match config.failure_policy {
            FailurePolicySetting::FailFast => FailurePolicy::FailFast,
            FailurePolicySetting::Partial => FailurePolicy::Partial,
        },
        max_concurrent_files: config.max_concurrent_files,
        file_timeout: Duration::from_secs(config.file_timeout_secs),
        batch_timeout: Duration::from_secs(config.batch_timeout_secs),
    }
}

pub fn registry_config(config: &AppConfig, compute: ComputeProfile) -> AlignmentRegistryConfig {
    let alignment = &config.service.alignment;
    AlignmentRegistryConfig {
        token_languages: alignment.languages.clone(),
        token_fallback: alignment.token_fallback,
        min_word_duration_ms: alignment.min_word_duration_ms,
        models: alignment
            .models
            .iter()
            .map(|(language, paths)| {
                (
                    language.to_ascii_lowercase(),
                    Wav2Vec2ModelFiles {
                        model_path: paths.model_path.clone(),
                        config_path: paths.config_path.clone(),
                        vocab_path: paths.vocab_path.clone(),
                    },
                )
            })
            .collect(),
        compute,
        sample_rate_hz: config.service.audio.target_sample_rate_hz,
    }
}

#[cfg(feature = "whisper-runtime")]
fn build_transcription(
    config: &AppConfig,
    compute: ComputeProfile,
) -> Result<Arc<dyn TranscriptionPort>, Error> {
    let asr = &config.service.asr;
    tracing::info!(model_path = %asr.model_path, language = %asr.default_language, "loading whisper model");
    let adapter = WhisperTranscriptionAdapter::new(WhisperAdapterConfig {
        model_path: asr.model_path.clone(),
        language: asr.default_language.clone(),
        temperature: asr.temperature,
        threads: asr.threads,
        compute,
    })
    .map_err(|err| anyhow!("failed to load whisper model: {err}"))?;
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "whisper-runtime"))]
fn build_transcription(
    _config: &AppConfig,
    _compute: ComputeProfile,
) -> Result<Arc<dyn TranscriptionPort>, Error> {
    Err(anyhow!(
        "service compiled without `whisper-runtime`; rebuild with `--features whisper-runtime`"
    ))
}

fn log_runtime_features() {
    #[cfg(feature = "whisper-runtime")]
    tracing::info!("whisper runtime feature enabled");
    #[cfg(not(feature = "whisper-runtime"))]
    tracing::warn!("service compiled without `whisper-runtime`; transcription is unavailable");
    #[cfg(feature = "whisper-cuda")]
    tracing::info!("whisper backend: CUDA");
    #[cfg(feature = "whisper-vulkan")]
    tracing::info!("whisper backend: Vulkan");
    #[cfg(all(
        feature = "whisper-runtime",
        not(feature = "whisper-cuda"),
        not(feature = "whisper-vulkan")
    ))]
    tracing::info!("whisper backend: CPU");
    #[cfg(feature = "wav2vec2-runtime")]
    tracing::info!("wav2vec2 alignment runtime enabled");
    #[cfg(not(feature = "wav2vec2-runtime"))]
    tracing::info!("wav2vec2 runtime not compiled; alignment uses recognizer token timing");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
