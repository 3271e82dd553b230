use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

mod loader;
mod logging;

pub use loader::{load_config, load_config_from, ConfigError, CONFIG_PREFIX};
pub use logging::setup_logging;

pub type AppConfig = TranscribeConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranscribeConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    #[validate(range(min = 1024))]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[serde(default)]
    #[validate(nested)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    #[validate(nested)]
    pub asr: AsrRuntimeConfig,
    #[serde(default)]
    #[validate(nested)]
    pub alignment: AlignmentRuntimeConfig,
    #[serde(default)]
    #[validate(nested)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    #[validate(range(min = 8_000, max = 48_000))]
    pub target_sample_rate_hz: u32,
    /// Directory for transcoded scratch files; the OS temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSelection {
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionSetting {
    Int8,
    Float16,
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    #[serde(default = "default_device")]
    pub device: DeviceSelection,
    #[serde(default)]
    pub cuda_ordinal: usize,
    #[serde(default = "default_precision")]
    pub precision: PrecisionSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AsrRuntimeConfig {
    #[serde(default = "default_model_path")]
    #[validate(length(min = 1))]
    pub model_path: String,
    /// `auto` lets the recognizer detect the language of each file.
    #[serde(default = "default_language")]
    #[validate(custom(function = "validate_language_setting"))]
    pub default_language: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_threads")]
    #[validate(range(min = 1, max = 256))]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wav2Vec2ModelPaths {
    pub model_path: String,
    pub config_path: String,
    pub vocab_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AlignmentRuntimeConfig {
    /// Languages the token aligner accepts when no acoustic model is configured.
    #[serde(default = "default_alignment_languages")]
    #[validate(custom(function = "validate_language_list"))]
    pub languages: Vec<String>,
    #[serde(default = "default_true")]
    pub token_fallback: bool,
    #[serde(default = "default_min_word_duration_ms")]
    pub min_word_duration_ms: u64,
    /// Languages whose resources are loaded at startup instead of first use.
    #[serde(default)]
    #[validate(custom(function = "validate_language_list"))]
    pub preload: Vec<String>,
    #[serde(default)]
    pub models: HashMap<String, Wav2Vec2ModelPaths>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    FailFast,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchConfig {
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_max_concurrent_files")]
    #[validate(range(min = 1, max = 64))]
    pub max_concurrent_files: usize,
    #[serde(default = "default_file_timeout_secs")]
    #[validate(range(min = 1))]
    pub file_timeout_secs: u64,
    #[serde(default = "default_batch_timeout_secs")]
    #[validate(range(min = 1))]
    pub batch_timeout_secs: u64,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate_hz: default_sample_rate(),
            scratch_dir: None,
        }
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            cuda_ordinal: 0,
            precision: default_precision(),
        }
    }
}

impl Default for AsrRuntimeConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            default_language: default_language(),
            temperature: 0.0,
            threads: default_threads(),
        }
    }
}

impl Default for AlignmentRuntimeConfig {
    fn default() -> Self {
        Self {
            languages: default_alignment_languages(),
            token_fallback: true,
            min_word_duration_ms: default_min_word_duration_ms(),
            preload: Vec::new(),
            models: HashMap::new(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            failure_policy: default_failure_policy(),
            max_concurrent_files: default_max_concurrent_files(),
            file_timeout_secs: default_file_timeout_secs(),
            batch_timeout_secs: default_batch_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_device() -> DeviceSelection {
    DeviceSelection::Auto
}

fn default_precision() -> PrecisionSetting {
    PrecisionSetting::Int8
}

fn default_model_path() -> String {
    "models/ggml-base.bin".to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_alignment_languages() -> Vec<String> {
    [
        "en", "fr", "de", "es", "it", "ja", "zh", "nl", "uk", "pt", "ar", "cs", "ru", "pl", "hu",
        "fi", "fa", "el", "tr", "da", "he", "vi", "ko", "ur", "te", "hi", "ca", "ml", "no", "nn",
        "sk", "sl", "hr", "ro", "eu", "gl", "ka", "lv", "tl",
    ]
    .iter()
    .map(|code| code.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_min_word_duration_ms() -> u64 {
    20
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::FailFast
}

fn default_max_concurrent_files() -> usize {
    2
}

fn default_file_timeout_secs() -> u64 {
    600
}

fn default_batch_timeout_secs() -> u64 {
    3_600
}

fn is_language_code(raw: &str) -> bool {
    let code = raw.trim();
    (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic())
}

fn validate_language_setting(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("auto") || is_language_code(value) {
        return Ok(());
    }
    Err(ValidationError::new("language_code")
        .with_message(format!("`{value}` is neither `auto` nor a 2-3 letter language code").into()))
}

fn validate_language_list(values: &[String]) -> Result<(), ValidationError> {
    match values.iter().find(|raw| !is_language_code(raw)) {
        Some(bad) => Err(ValidationError::new("language_code")
            .with_message(format!("`{bad}` is not a 2-3 letter language code").into())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_deterministic() {
        let cfg = TranscribeConfig::default();
        assert_eq!(cfg.service.audio.target_sample_rate_hz, 16_000);
        assert_eq!(cfg.service.asr.temperature, 0.0);
        assert_eq!(cfg.service.batch.failure_policy, FailurePolicy::FailFast);
        assert_eq!(cfg.service.compute.precision, PrecisionSetting::Int8);
        assert_eq!(cfg.server.port, 8080);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_language_settings_are_rejected() {
        let mut cfg = TranscribeConfig::default();
        cfg.service.asr.default_language = "english".to_string();
        let message = cfg.validate().unwrap_err().to_string();
        assert!(message.contains("default_language"));
        assert!(message.contains("`english`"));

        let mut cfg = TranscribeConfig::default();
        cfg.service.alignment.preload = vec!["en".to_string(), "e1".to_string()];
        let message = cfg.validate().unwrap_err().to_string();
        assert!(message.contains("preload"));
        assert!(message.contains("`e1`"));

        let mut cfg = TranscribeConfig::default();
        cfg.service.asr.default_language = "FR".to_string();
        cfg.service.alignment.preload = vec!["en".to_string()];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cfg = TranscribeConfig::default();
        cfg.service.batch.max_concurrent_files = 0;
        assert!(cfg.validate().is_err());
    }
}
