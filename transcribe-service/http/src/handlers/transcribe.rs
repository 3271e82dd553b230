use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use transcribe_application::TranscribeBatchRequest;
use transcribe_domain::UploadedFile;

use crate::dto::TranscribeResponse;
use crate::error::{error_mapper, HttpError};
use crate::state::AppState;

const FILES_FIELD: &str = "files";

fn multipart_error(err: MultipartError) -> HttpError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpError::PayloadTooLarge {
            message: err.body_text(),
        }
    } else {
        HttpError::bad_request(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// Request-scoped directory holding the spooled uploads. Created on the first
/// file part so a request without files never touches the disk.
fn spool_dir<'a>(
    spool: &'a mut Option<TempDir>,
    state: &AppState,
) -> Result<&'a TempDir, HttpError> {
    if spool.is_none() {
        let mut builder = tempfile::Builder::new();
        builder.prefix("transcribe-upload-");
        let dir = match &state.spool_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| HttpError::internal(format!("cannot create upload spool: {e}")))?;
        debug!(path = %dir.path().display(), "upload spool created");
        *spool = Some(dir);
    }
    spool
        .as_ref()
        .ok_or_else(|| HttpError::internal("upload spool unavailable"))
}

async fn spool_field(
    field: &mut Field<'_>,
    dir: &TempDir,
    index: usize,
) -> Result<UploadedFile, HttpError> {
    let filename = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("upload-{index}"));
    // client names never reach the filesystem
    let location = dir.path().join(format!("{index:04}.upload"));

    let mut file = tokio::fs::File::create(&location)
        .await
        .map_err(|e| HttpError::internal(format!("cannot spool `{filename}`: {e}")))?;
    let mut bytes = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        bytes += chunk.len();
        file.write_all(&chunk)
            .await
            .map_err(|e| HttpError::internal(format!("cannot spool `{filename}`: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| HttpError::internal(format!("cannot spool `{filename}`: {e}")))?;

    debug!(filename = %filename, bytes, "upload spooled");
    Ok(UploadedFile::new(filename, location))
}

pub async fn transcribe_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscribeResponse>, HttpError> {
    let mut multipart = multipart.map_err(|rejection| {
        HttpError::bad_request(format!("expected a multipart body: {}", rejection.body_text()))
    })?;

    let mut spool: Option<TempDir> = None;
    let mut uploads = Vec::new();
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILES_FIELD) {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }
        let dir = spool_dir(&mut spool, &state)?;
        let upload = spool_field(&mut field, dir, uploads.len()).await?;
        uploads.push(upload);
    }

    if uploads.is_empty() {
        return Err(HttpError::bad_request(format!(
            "no files supplied; send audio under the `{FILES_FIELD}` field"
        )));
    }

    let file_count = uploads.len();
    info!(file_count, "received transcribe request");

    let outcome = state
        .batch_usecase
        .transcribe_batch(TranscribeBatchRequest::new(uploads))
        .await;

    if let Some(dir) = spool {
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            error!(path = %path.display(), error = %e, "failed to remove upload spool");
        }
    }

    match outcome {
        Ok(batch) => {
            let failed = batch.files.iter().filter(|f| !f.is_completed()).count();
            info!(
                batch_id = %batch.batch_id,
                file_count,
                failed,
                "transcribe request completed"
            );
            Ok(Json(TranscribeResponse::from(batch)))
        }
        Err(e) => Err(error_mapper(e)),
    }
}
