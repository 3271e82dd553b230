use validator::Validate;

use transcribe_domain::UploadedFile;

#[derive(Debug, Clone, Validate)]
pub struct TranscribeBatchRequest {
    #[validate(length(min = 1, message = "at least one file is required"))]
    pub uploads: Vec<UploadedFile>,
}

impl TranscribeBatchRequest {
    pub fn new(uploads: Vec<UploadedFile>) -> Self {
        Self { uploads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_count_is_validated() {
        let empty = TranscribeBatchRequest::new(Vec::new());
        let errors = empty.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("uploads"));

        let single = TranscribeBatchRequest::new(vec![UploadedFile::new("a.wav", "/tmp/a.wav")]);
        assert!(single.validate().is_ok());
    }
}
