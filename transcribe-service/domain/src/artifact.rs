use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::DomainError;

/// Audio in the canonical format, ready for the engines.
///
/// `PassThrough` points at storage the pipeline does not own; releasing it is
/// a no-op. `Scratch` is created by the normalizer for a single file and is
/// removed by [`AudioArtifact::release`], or when dropped if the file's turn
/// ends early (error, timeout, cancellation).
#[derive(Debug)]
pub enum AudioArtifact {
    PassThrough { path: PathBuf },
    Scratch(ScratchFile),
}

impl AudioArtifact {
    pub fn pass_through(path: impl Into<PathBuf>) -> Self {
        Self::PassThrough { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        match self {
            AudioArtifact::PassThrough { path } => path,
            AudioArtifact::Scratch(file) => file.path(),
        }
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, AudioArtifact::Scratch(_))
    }

    pub fn release(self) -> Result<(), DomainError> {
        match self {
            AudioArtifact::PassThrough { .. } => Ok(()),
            AudioArtifact::Scratch(file) => file.release(),
        }
    }
}

#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn new(path: TempPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> Result<(), DomainError> {
        let display = self.path.display().to_string();
        self.path.close().map_err(|err| {
            DomainError::internal_error(format!("failed to remove scratch file {display}: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn scratch() -> ScratchFile {
        let mut file = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .expect("temp file");
        file.write_all(b"RIFF").expect("write");
        ScratchFile::new(file.into_temp_path())
    }

    #[test]
    fn release_removes_scratch_file() {
        let artifact = AudioArtifact::Scratch(scratch());
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        artifact.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_scratch_file() {
        let artifact = AudioArtifact::Scratch(scratch());
        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn pass_through_release_keeps_source() {
        let source = tempfile::NamedTempFile::new().expect("temp file");
        let artifact = AudioArtifact::pass_through(source.path());
        assert!(!artifact.is_scratch());
        artifact.release().expect("release");
        assert!(source.path().exists());
    }
}
