pub mod ctc;
mod error;
mod registry;
mod token;
#[cfg(feature = "wav2vec2-runtime")]
mod wav2vec2;

pub use error::AlignError;
pub use registry::{AlignmentRegistry, AlignmentRegistryConfig, Wav2Vec2ModelFiles};
pub use token::{align_with_tokens, TokenAligner, CHARACTER_LANGUAGES};
#[cfg(feature = "wav2vec2-runtime")]
pub use wav2vec2::Wav2Vec2Aligner;
