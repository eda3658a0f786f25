// handlers/public/auth.rs - POST /api/auth/register, POST /api/auth/login

use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::user_service::{AuthPayload, LoginRequest, RegisterRequest};
use crate::services::UserService;

/// POST /api/auth/register - Create a student or tutor account and sign it in
pub async fn register(State(state): State<AppState>, ApiJson(req): ApiJson<RegisterRequest>) -> ApiResult<AuthPayload> {
    let payload = UserService::new(&state).register(req).await?;
    Ok(ApiResponse::created(payload))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
pub async fn login(State(state): State<AppState>, ApiJson(req): ApiJson<LoginRequest>) -> ApiResult<AuthPayload> {
    let payload = UserService::new(&state).login(req).await?;
    Ok(ApiResponse::success(payload))
}
