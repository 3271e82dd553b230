use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use transcribe_application::ApplicationError;
use transcribe_domain::DomainError;

#[derive(Debug)]
pub enum HttpError {
    BadRequest { message: String },
    PayloadTooLarge { message: String },
    Unprocessable { message: String },
    Timeout { message: String },
    Internal { message: String },
}

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            HttpError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            HttpError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            HttpError::BadRequest { message }
            | HttpError::PayloadTooLarge { message }
            | HttpError::Unprocessable { message }
            | HttpError::Timeout { message }
            | HttpError::Internal { message } => message,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.message(), "request rejected");
        }

        (
            status,
            Json(json!({
                "error": self.message(),
            })),
        )
            .into_response()
    }
}

pub fn error_mapper(error: ApplicationError) -> HttpError {
    match error {
        ApplicationError::Validation(message) => HttpError::BadRequest { message },
        ApplicationError::Internal(message) => HttpError::Internal { message },
        ApplicationError::Domain(domain) => {
            let message = domain.to_string();
            match domain {
                DomainError::UnreadableUpload { .. } => HttpError::BadRequest { message },
                DomainError::TranscriptionFailure(_)
                | DomainError::UnsupportedLanguage(_)
                | DomainError::AlignmentFailure(_) => HttpError::Unprocessable { message },
                DomainError::Timeout { .. } => HttpError::Timeout { message },
                DomainError::ResourceAllocation(_) | DomainError::Internal(_) => {
                    HttpError::Internal { message }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ApplicationError) -> StatusCode {
        error_mapper(error).status()
    }

    #[test]
    fn domain_errors_map_to_documented_statuses() {
        assert_eq!(
            status_of(ApplicationError::Validation("no files".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::unreadable_upload("a.wav", "garbage").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::resource_allocation("disk full").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(DomainError::transcription_failure("corrupt").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::unsupported_language("tlh").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::alignment_failure("mismatch").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::timeout("batch", 30).into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(DomainError::internal_error("join").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
