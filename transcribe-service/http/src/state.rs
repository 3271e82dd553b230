use std::path::PathBuf;
use std::sync::Arc;

use transcribe_application::BatchTranscriptionUseCase;

#[derive(Clone)]
pub struct AppState {
    pub batch_usecase: Arc<dyn BatchTranscriptionUseCase>,
    /// Parent directory for per-request upload spools; the OS temp dir when `None`.
    pub spool_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(batch_usecase: Arc<dyn BatchTranscriptionUseCase>) -> Self {
        Self {
            batch_usecase,
            spool_root: None,
        }
    }

    pub fn with_spool_root(mut self, spool_root: impl Into<PathBuf>) -> Self {
        self.spool_root = Some(spool_root.into());
        self
    }
}
