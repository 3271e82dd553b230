mod dto;
mod error;
mod usecase;

pub use dto::batch::TranscribeBatchRequest;
pub use error::ApplicationError;
pub use usecase::batch::{
    BatchPolicy, BatchTranscriptionUseCase, BatchTranscriptionUseCaseImpl, FailurePolicy,
};
