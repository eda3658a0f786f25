// handlers/elevated/users.rs - account administration

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::User;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::SuspendRequest;
use crate::services::UserService;

/// GET /api/admin/users
pub async fn list(State(state): State<AppState>, ApiQuery(params): ApiQuery<ListParams>) -> ApiResult<Page<User>> {
    Ok(ApiResponse::success(UserService::new(&state).list(&params).await?))
}

/// POST /api/admin/users/:id/suspend
pub async fn suspend(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SuspendRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(&state).suspend(&admin, id, req).await?))
}

/// POST /api/admin/users/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(UserService::new(&state).activate(&admin, id).await?))
}
