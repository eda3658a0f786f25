// handlers/elevated/tutors.rs - tutor verification queue

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::TutorProfile;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::tutor_service::RejectRequest;
use crate::services::TutorService;

/// GET /api/admin/tutors - Tutors of any verification status
pub async fn list(State(state): State<AppState>, ApiQuery(params): ApiQuery<ListParams>) -> ApiResult<Page<TutorProfile>> {
    Ok(ApiResponse::success(TutorService::new(&state).review_queue(&params).await?))
}

/// POST /api/admin/tutors/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<TutorProfile> {
    Ok(ApiResponse::success(TutorService::new(&state).approve(&admin, id).await?))
}

/// POST /api/admin/tutors/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RejectRequest>,
) -> ApiResult<TutorProfile> {
    Ok(ApiResponse::success(TutorService::new(&state).reject(&admin, id, req).await?))
}
