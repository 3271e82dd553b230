use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use transcribe_configuration::ServerConfig;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

pub use error::{error_mapper, HttpError};
pub use handlers::*;
pub use state::AppState;

pub fn create_app_routes(state: AppState, config: &ServerConfig) -> Router {
    // audio uploads are large; the limit applies to the whole multipart body
    let transcribe_route =
        post(transcribe_files).layer(DefaultBodyLimit::max(config.max_upload_bytes));

    Router::new()
        .route("/", get(redirect_to_docs))
        .route("/docs", get(docs_page))
        .route("/openapi.json", get(openapi_document))
        .route("/health", get(health))
        .route("/transcribe", transcribe_route)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
