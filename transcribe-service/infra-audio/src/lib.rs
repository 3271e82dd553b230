mod decode;
mod error;
mod normalizer;
mod resample;
mod sniff;
mod wav;

pub use error::NormalizeError;
pub use normalizer::{AudioNormalizer, AudioNormalizerConfig};
pub use sniff::{is_canonical_wav, sniff_media, SniffedMedia};
pub use wav::{load_pcm_samples, wav_duration_ms, PcmAudio};
