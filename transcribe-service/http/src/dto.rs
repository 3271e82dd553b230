use serde::Serialize;
use transcribe_domain::{
    BatchResult, ErrorKind, FileOutcome, FileResult, TranscriptSegment, WordTiming,
};

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub results: Vec<FileResultDto>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FileResultDto {
    Completed {
        filename: String,
        language: String,
        transcript: Vec<SegmentDto>,
    },
    Failed {
        filename: String,
        error: FileErrorDto,
    },
}

#[derive(Debug, Serialize)]
pub struct FileErrorDto {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SegmentDto {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub words: Vec<WordDto>,
}

#[derive(Debug, Serialize)]
pub struct WordDto {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub score: f32,
}

impl From<BatchResult> for TranscribeResponse {
    fn from(batch: BatchResult) -> Self {
        Self {
            results: batch.files.into_iter().map(FileResultDto::from).collect(),
        }
    }
}

impl From<FileOutcome> for FileResultDto {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Completed(FileResult {
                filename,
                language,
                transcript,
            }) => FileResultDto::Completed {
                filename,
                language: language.into(),
                transcript: transcript.into_iter().map(SegmentDto::from).collect(),
            },
            FileOutcome::Failed { filename, error } => FileResultDto::Failed {
                filename,
                error: FileErrorDto {
                    kind: error.kind(),
                    message: error.to_string(),
                },
            },
        }
    }
}

impl From<TranscriptSegment> for SegmentDto {
    fn from(segment: TranscriptSegment) -> Self {
        Self {
            start: seconds(segment.start_ms),
            end: seconds(segment.end_ms),
            text: segment.text.trim().to_string(),
            words: segment.words.into_iter().map(WordDto::from).collect(),
        }
    }
}

impl From<WordTiming> for WordDto {
    fn from(word: WordTiming) -> Self {
        Self {
            word: word.word,
            start: seconds(word.start_ms),
            end: seconds(word.end_ms),
            score: word.confidence,
        }
    }
}
