use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use transcribe_application::{
    ApplicationError, BatchPolicy, BatchTranscriptionUseCase, BatchTranscriptionUseCaseImpl,
    FailurePolicy, TranscribeBatchRequest,
};
use transcribe_domain::{
    AlignmentPort, AudioArtifact, AudioNormalizerPort, DomainError, ErrorKind, FileOutcome,
    LanguageAligner, LanguageCode, ScratchFile, TranscriptSegment, TranscriptToken,
    TranscriptionOutput, TranscriptionPort, UploadedFile, WordTiming,
};

/// Creates a scratch file for every upload unless its name contains `canonical`.
struct MockNormalizer {
    scratch_dir: PathBuf,
    created: Mutex<Vec<PathBuf>>,
    calls: AtomicUsize,
}

impl MockNormalizer {
    fn new(scratch_dir: &Path) -> Self {
        Self {
            scratch_dir: scratch_dir.to_path_buf(),
            created: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn created(&self) -> Vec<PathBuf> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioNormalizerPort for MockNormalizer {
    async fn normalize(
        &self,
        upload: &UploadedFile,
        batch_id: &str,
    ) -> Result<AudioArtifact, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if upload.filename.contains("unreadable") {
            return Err(DomainError::unreadable_upload(&upload.filename, "not audio"));
        }
        if upload.filename.contains("canonical") {
            return Ok(AudioArtifact::pass_through(&upload.location));
        }
        let path = tempfile::Builder::new()
            .prefix(&format!("{batch_id}-{}-", upload.filename))
            .suffix(".wav")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| DomainError::resource_allocation(e.to_string()))?
            .into_temp_path();
        self.created.lock().unwrap().push(path.to_path_buf());
        Ok(AudioArtifact::Scratch(ScratchFile::new(path)))
    }
}

struct Script {
    needle: &'static str,
    language: &'static str,
    delay_ms: u64,
    fails: bool,
}

/// Picks its behaviour from the artifact path, which carries the upload name.
struct MockTranscriber {
    scripts: Vec<Script>,
}

#[async_trait]
impl TranscriptionPort for MockTranscriber {
    async fn transcribe(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<TranscriptionOutput, DomainError> {
        let path = artifact.path().to_string_lossy().to_string();
        let script = self
            .scripts
            .iter()
            .find(|s| path.contains(s.needle))
            .ok_or_else(|| DomainError::internal_error(format!("no script for {path}")))?;
        tokio::time::sleep(Duration::from_millis(script.delay_ms)).await;
        if script.fails {
            return Err(DomainError::transcription_failure("corrupt audio"));
        }
        let mut segment = TranscriptSegment::new(format!("hello {}", script.needle), 0, 1_000);
        segment.tokens = vec![
            TranscriptToken {
                text: " hello".to_string(),
                start_ms: 0,
                end_ms: 400,
                confidence: 0.9,
            },
            TranscriptToken {
                text: format!(" {}", script.needle),
                start_ms: 400,
                end_ms: 1_000,
                confidence: 0.8,
            },
        ];
        Ok(TranscriptionOutput {
            language: LanguageCode::parse(script.language)?,
            segments: vec![segment],
        })
    }
}

struct MockAligner {
    language: LanguageCode,
}

#[async_trait]
impl LanguageAligner for MockAligner {
    fn language(&self) -> &LanguageCode {
        &self.language
    }

    async fn align(
        &self,
        segments: Vec<TranscriptSegment>,
        _artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, DomainError> {
        Ok(segments
            .into_iter()
            .map(|mut segment| {
                segment.words = segment
                    .tokens
                    .iter()
                    .map(|token| WordTiming {
                        word: token.text.trim().to_string(),
                        start_ms: token.start_ms,
                        end_ms: token.end_ms,
                        confidence: token.confidence,
                    })
                    .collect();
                segment
            })
            .collect())
    }
}

struct MockAlignment {
    supported: Vec<&'static str>,
}

#[async_trait]
impl AlignmentPort for MockAlignment {
    async fn load_alignment_resources(
        &self,
        language: &LanguageCode,
    ) -> Result<Arc<dyn LanguageAligner>, DomainError> {
        if !self.supported.contains(&language.as_str()) {
            return Err(DomainError::unsupported_language(language.as_str()));
        }
        Ok(Arc::new(MockAligner {
            language: language.clone(),
        }))
    }
}

fn script(needle: &'static str, language: &'static str, delay_ms: u64) -> Script {
    Script {
        needle,
        language,
        delay_ms,
        fails: false,
    }
}

fn policy(failure_policy: FailurePolicy, max_concurrent_files: usize) -> BatchPolicy {
    BatchPolicy {
        failure_policy,
        max_concurrent_files,
        file_timeout: Duration::from_secs(5),
        batch_timeout: Duration::from_secs(10),
    }
}

fn usecase(
    normalizer: Arc<MockNormalizer>,
    scripts: Vec<Script>,
    policy: BatchPolicy,
) -> BatchTranscriptionUseCaseImpl {
    BatchTranscriptionUseCaseImpl::new(
        normalizer,
        Arc::new(MockTranscriber { scripts }),
        Arc::new(MockAlignment {
            supported: vec!["en", "fr"],
        }),
        policy,
    )
}

fn uploads(dir: &Path, names: &[&str]) -> TranscribeBatchRequest {
    TranscribeBatchRequest::new(
        names
            .iter()
            .map(|name| {
                let location = dir.join(name);
                std::fs::write(&location, b"spooled").unwrap();
                UploadedFile::new(*name, location)
            })
            .collect(),
    )
}

fn completed_names(files: &[FileOutcome]) -> Vec<String> {
    files.iter().map(|f| f.filename().to_string()).collect()
}

#[tokio::test]
async fn results_follow_input_order_not_completion_order() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer,
        vec![
            script("slow", "en", 80),
            script("quick", "en", 5),
            script("medium", "en", 30),
        ],
        policy(FailurePolicy::FailFast, 3),
    );

    let result = usecase
        .transcribe_batch(uploads(spool.path(), &["slow", "quick", "medium"]))
        .await
        .expect("batch succeeds");

    assert_eq!(completed_names(&result.files), ["slow", "quick", "medium"]);
    assert!(result.files.iter().all(FileOutcome::is_completed));
    assert!(!result.batch_id.is_empty());
}

#[tokio::test]
async fn scratch_artifacts_are_removed_after_success() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![script("first", "en", 0), script("second", "fr", 0)],
        policy(FailurePolicy::FailFast, 2),
    );

    usecase
        .transcribe_batch(uploads(spool.path(), &["first", "second"]))
        .await
        .expect("batch succeeds");

    let created = normalizer.created();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn scratch_artifacts_are_removed_when_transcription_fails() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![
            script("good", "en", 0),
            Script {
                needle: "broken",
                language: "en",
                delay_ms: 0,
                fails: true,
            },
        ],
        policy(FailurePolicy::FailFast, 1),
    );

    let err = usecase
        .transcribe_batch(uploads(spool.path(), &["good", "broken"]))
        .await
        .unwrap_err();

    match err {
        ApplicationError::Domain(error) => {
            assert_eq!(error.kind(), ErrorKind::TranscriptionFailure)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(normalizer.created().iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn fail_fast_cancels_in_flight_files_and_cleans_up() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![
            Script {
                needle: "doomed",
                language: "en",
                delay_ms: 10,
                fails: true,
            },
            script("lingering", "en", 2_000),
        ],
        policy(FailurePolicy::FailFast, 2),
    );

    let started = std::time::Instant::now();
    let err = usecase
        .transcribe_batch(uploads(spool.path(), &["doomed", "lingering"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Domain(_)));
    assert!(started.elapsed() < Duration::from_millis(1_500));
    let created = normalizer.created();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn pass_through_upload_is_never_deleted() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![script("canonical", "en", 0)],
        policy(FailurePolicy::FailFast, 1),
    );

    let request = uploads(spool.path(), &["canonical.wav"]);
    let location = request.uploads[0].location.clone();
    usecase.transcribe_batch(request).await.expect("batch succeeds");

    assert!(location.exists());
    assert!(normalizer.created().is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected_before_any_work() {
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(normalizer.clone(), Vec::new(), BatchPolicy::default());

    let err = usecase
        .transcribe_batch(TranscribeBatchRequest::new(Vec::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Validation(_)));
    assert_eq!(normalizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn partial_policy_reports_each_failure_in_place() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![
            script("alpha", "en", 10),
            script("klingon", "tlh", 0),
            script("omega", "fr", 0),
        ],
        policy(FailurePolicy::Partial, 2),
    );

    let result = usecase
        .transcribe_batch(uploads(
            spool.path(),
            &["alpha", "klingon", "unreadable.mp3", "omega"],
        ))
        .await
        .expect("partial batches succeed");

    assert_eq!(
        completed_names(&result.files),
        ["alpha", "klingon", "unreadable.mp3", "omega"]
    );
    let kinds: Vec<Option<ErrorKind>> = result
        .files
        .iter()
        .map(|outcome| match outcome {
            FileOutcome::Completed(_) => None,
            FileOutcome::Failed { error, .. } => Some(error.kind()),
        })
        .collect();
    assert_eq!(
        kinds,
        [
            None,
            Some(ErrorKind::UnsupportedLanguage),
            Some(ErrorKind::UnreadableUpload),
            None
        ]
    );
    assert!(normalizer.created().iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn file_timeout_is_reported_and_scratch_removed() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![script("stuck", "en", 5_000)],
        BatchPolicy {
            failure_policy: FailurePolicy::FailFast,
            max_concurrent_files: 1,
            file_timeout: Duration::from_millis(50),
            batch_timeout: Duration::from_secs(10),
        },
    );

    let err = usecase
        .transcribe_batch(uploads(spool.path(), &["stuck"]))
        .await
        .unwrap_err();

    match err {
        ApplicationError::Domain(error) => assert_eq!(error.kind(), ErrorKind::Timeout),
        other => panic!("unexpected error: {other:?}"),
    }
    let created = normalizer.created();
    assert_eq!(created.len(), 1);
    assert!(!created[0].exists());
}

#[tokio::test]
async fn batch_timeout_bounds_the_whole_request() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![script("one", "en", 60), script("two", "en", 60)],
        BatchPolicy {
            failure_policy: FailurePolicy::Partial,
            max_concurrent_files: 1,
            file_timeout: Duration::from_secs(5),
            batch_timeout: Duration::from_millis(90),
        },
    );

    let err = usecase
        .transcribe_batch(uploads(spool.path(), &["one", "two"]))
        .await
        .unwrap_err();

    match err {
        ApplicationError::Domain(DomainError::Timeout { scope, .. }) => assert_eq!(scope, "batch"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(normalizer.created().iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn mixed_language_batch_is_aligned_per_file() {
    let spool = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let normalizer = Arc::new(MockNormalizer::new(scratch.path()));
    let usecase = usecase(
        normalizer.clone(),
        vec![script("english", "en", 20), script("francais", "fr", 0)],
        policy(FailurePolicy::FailFast, 2),
    );

    let result = usecase
        .transcribe_batch(uploads(spool.path(), &["english.mp3", "francais.wav"]))
        .await
        .expect("batch succeeds");

    let files: Vec<_> = result
        .files
        .iter()
        .map(|outcome| match outcome {
            FileOutcome::Completed(file) => file,
            FileOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
        })
        .collect();
    assert_eq!(files[0].filename, "english.mp3");
    assert_eq!(files[0].language.as_str(), "en");
    assert_eq!(files[1].filename, "francais.wav");
    assert_eq!(files[1].language.as_str(), "fr");
    for file in files {
        let words: Vec<&str> = file.transcript[0]
            .words
            .iter()
            .map(|w| w.word.as_str())
            .collect();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], "hello");
    }
    assert!(normalizer.created().iter().all(|path| !path.exists()));
}
