use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use transcribe_domain::{AlignmentPort, ComputeProfile, DomainError, LanguageAligner, LanguageCode};

use crate::TokenAligner;

#[derive(Debug, Clone)]
pub struct Wav2Vec2ModelFiles {
    pub model_path: String,
    pub config_path: String,
    pub vocab_path: String,
}

#[derive(Debug, Clone)]
pub struct AlignmentRegistryConfig {
    /// Languages the token aligner serves when no acoustic model is set up.
    pub token_languages: Vec<String>,
    pub token_fallback: bool,
    pub min_word_duration_ms: u64,
    pub models: HashMap<String, Wav2Vec2ModelFiles>,
    pub compute: ComputeProfile,
    pub sample_rate_hz: u32,
}

type AlignerSlot = Arc<OnceCell<Arc<dyn LanguageAligner>>>;

/// Per-language alignment resources, built on first use (or at preload) and
/// shared read-only afterwards. A failed load is retried on the next request.
pub struct AlignmentRegistry {
    config: AlignmentRegistryConfig,
    slots: Mutex<HashMap<LanguageCode, AlignerSlot>>,
}

impl AlignmentRegistry {
    pub fn new(config: AlignmentRegistryConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn preload(&self, languages: &[String]) -> Result<(), DomainError> {
        for raw in languages {
            let language = LanguageCode::parse(raw)
                .map_err(|_| DomainError::unsupported_language(raw.trim()))?;
            self.load_alignment_resources(&language).await?;
            tracing::info!(language = %language, "alignment resources preloaded");
        }
        Ok(())
    }

    pub fn loaded_languages(&self) -> Vec<String> {
        let Ok(slots) = self.slots.lock() else {
            return Vec::new();
        };
        let mut loaded: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(code, _)| code.to_string())
            .collect();
        loaded.sort();
        loaded
    }

    fn slot(&self, language: &LanguageCode) -> Result<AlignerSlot, DomainError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| DomainError::internal_error("alignment registry lock poisoned"))?;
        Ok(slots.entry(language.clone()).or_default().clone())
    }

    async fn build(
        &self,
        language: &LanguageCode,
    ) -> Result<Arc<dyn LanguageAligner>, DomainError> {
        if let Some(files) = self.config.models.get(language.as_str()) {
            #[cfg(feature = "wav2vec2-runtime")]
            {
                let files = files.clone();
                let code = language.clone();
                let compute = self.config.compute;
                let sample_rate_hz = self.config.sample_rate_hz;
                let min_word_duration_ms = self.config.min_word_duration_ms;
                let aligner = tokio::task::spawn_blocking(move || {
                    crate::Wav2Vec2Aligner::load(
                        code,
                        &files,
                        compute,
                        sample_rate_hz,
                        min_word_duration_ms,
                    )
                })
                .await
                .map_err(|e| DomainError::internal_error(format!("model load task failed: {e}")))?
                .map_err(|e| {
                    DomainError::internal_error(format!(
                        "failed to load alignment model for `{language}`: {e}"
                    ))
                })?;
                return Ok(Arc::new(aligner));
            }
            #[cfg(not(feature = "wav2vec2-runtime"))]
            tracing::warn!(
                language = %language,
                model_path = %files.model_path,
                "wav2vec2 runtime not compiled in, falling back to token timing"
            );
        }

        let token_language = self
            .config
            .token_languages
            .iter()
            .any(|code| code.eq_ignore_ascii_case(language.as_str()));
        if self.config.token_fallback && token_language {
            tracing::debug!(language = %language, "using token aligner");
            return Ok(Arc::new(TokenAligner::new(
                language.clone(),
                self.config.min_word_duration_ms,
            )));
        }

        Err(DomainError::unsupported_language(language.as_str()))
    }
}

#[async_trait]
impl AlignmentPort for AlignmentRegistry {
    async fn load_alignment_resources(
        &self,
        language: &LanguageCode,
    ) -> Result<Arc<dyn LanguageAligner>, DomainError> {
        let slot = self.slot(language)?;
        let aligner = slot.get_or_try_init(|| self.build(language)).await?;
        Ok(aligner.clone())
    }
}
