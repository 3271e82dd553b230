mod docs;
mod transcribe;

pub use docs::{docs_page, health, openapi_document, redirect_to_docs};
pub use transcribe::transcribe_files;
