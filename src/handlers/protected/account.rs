// handlers/protected/account.rs - /api/auth/me, /api/auth/password

use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::ChangePasswordRequest;
use crate::services::UserService;

/// GET /api/auth/me - The caller's account
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(&state).me(&user).await?))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Value> {
    UserService::new(&state).change_password(&user, req).await?;
    Ok(ApiResponse::success(json!({ "updated": true })).with_message("Password updated"))
}
