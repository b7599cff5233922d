use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::AuthUser;
use crate::models::Video;
use crate::services::upload_service::IncomingUpload;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{HeaderMap, header},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// Multipart form field carrying the video bytes.
pub const VIDEO_FIELD: &str = "video";

#[utoipa::path(
    post,
    path = "/api/videos/{video_id}/upload",
    params(
        ("video_id" = Uuid, Path, description = "Video to attach the upload to")
    ),
    request_body(content = Multipart, description = "Multipart form with a `video` file part", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video processed and stored", body = Video),
        (status = 400, description = "Invalid ID, missing file part or unsupported content type", body = crate::api::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token, or caller does not own the video", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Store, media tool or object storage failure", body = crate::api::error::ErrorResponse)
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video_id =
        Uuid::parse_str(&video_id).map_err(|_| AppError::BadRequest("Invalid ID".to_string()))?;

    let service = &state.upload_service;
    let video = service.authorize(video_id, user.id).await?;

    let body_limit = crate::request_body_limit(service.max_upload_size());
    if declared_content_length(&headers).is_some_and(|len| len > body_limit) {
        return Err(AppError::BadRequest(format!(
            "Video exceeds the maximum upload size of {} bytes",
            service.max_upload_size()
        )));
    }

    let mut multipart = multipart.map_err(|e| {
        AppError::BadRequest(format!("Unable to parse form file: {}", e.body_text()))
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Unable to parse form file: {}", e)))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let part_length = declared_content_length(field.headers());
        let body_with_io_error = field.map_err(std::io::Error::other);
        let reader = StreamReader::new(Box::pin(body_with_io_error));

        let updated = service
            .process(
                video,
                IncomingUpload {
                    reader,
                    content_type,
                    size_hint: part_length,
                },
            )
            .await?;

        return Ok(Json(updated));
    }

    Err(AppError::BadRequest(
        "Unable to parse form file: missing `video` part".to_string(),
    ))
}

fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
