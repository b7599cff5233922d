pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::upload_service::VideoUploadService;
use crate::services::video_store::VideoStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Allowance for multipart boundaries and headers on top of the upload ceiling.
pub const MULTIPART_OVERHEAD: u64 = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::videos::upload_video,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::Video,
            api::error::ErrorResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "videos", description = "Video upload endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub videos: Arc<dyn VideoStore>,
    pub upload_service: Arc<VideoUploadService>,
    pub config: UploadConfig,
}

/// Largest request body accepted for an upload of at most `max_upload_size` bytes.
pub fn request_body_limit(max_upload_size: u64) -> u64 {
    max_upload_size.saturating_add(MULTIPART_OVERHEAD)
}

pub fn create_app(state: AppState) -> Router {
    let body_limit =
        usize::try_from(request_body_limit(state.config.max_upload_size)).unwrap_or(usize::MAX);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/videos/:video_id/upload",
            post(api::handlers::videos::upload_video)
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
