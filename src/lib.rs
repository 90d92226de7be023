pub mod config;
pub mod file_operations;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use config::AppConfig;
use file_operations::claims::attach_roles;
use file_operations::handlers;
use file_operations::store::ObjectStore;

// --- Application State ---
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ObjectStore>,
}

/// Builds the full application router. Every route passes through the
/// claims middleware, which attaches the caller's role set; the handlers'
/// gate checks make the actual allow/deny decision.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        .route("/api/v1/files", get(handlers::list_files))
        .route(
            "/api/v1/file/{*path}",
            get(handlers::download_file)
                .head(handlers::head_file)
                .put(handlers::upload_file)
                .delete(handlers::delete_file),
        )
        .route("/api/v1/move", post(handlers::move_file))
        .route(
            "/api/v1/folder",
            post(handlers::create_folder)
                .head(handlers::head_folder)
                .delete(handlers::delete_folder),
        )
        .route("/api/v1/upload/chunk", put(handlers::stage_chunk))
        .route("/api/v1/upload/commit", post(handlers::commit_upload))
        .route("/api/v1/share", post(handlers::issue_share_token))
        .layer(body_limit)
        .layer(middleware::from_fn_with_state(state.clone(), attach_roles))
        .layer(cors)
        .with_state(state)
}
