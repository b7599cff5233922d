use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::{bearer_token, validate_jwt};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Couldn't find JWT".to_string()))?;

    let user_id = validate_jwt(token, &state.config.jwt_secret, &state.config.jwt_issuer)
        .map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            AppError::Unauthorized("Couldn't validate JWT".to_string())
        })?;

    req.extensions_mut().insert(AuthUser { id: user_id });
    Ok(next.run(req).await)
}
