// handlers/protected/notifications.rs

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Notification;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::notification_service::MarkedRead;
use crate::services::NotificationService;

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Notification>> {
    Ok(ApiResponse::success(NotificationService::new(&state).list(&user, &params).await?))
}

/// POST /api/notifications/:id/read
pub async fn read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Notification> {
    Ok(ApiResponse::success(NotificationService::new(&state).mark_read(&user, id).await?))
}

/// POST /api/notifications/read-all
pub async fn read_all(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<MarkedRead> {
    Ok(ApiResponse::success(NotificationService::new(&state).mark_all_read(&user).await?))
}
