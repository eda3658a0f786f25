// handlers/protected/tutors.rs - marketplace directory and profiles

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::TutorProfile;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::tutor_service::UpdateProfileRequest;
use crate::services::TutorService;

/// GET /api/tutors - Approved tutors, filterable by subject, rate and rating
pub async fn list(State(state): State<AppState>, ApiQuery(params): ApiQuery<ListParams>) -> ApiResult<Page<TutorProfile>> {
    Ok(ApiResponse::success(TutorService::new(&state).directory(&params).await?))
}

/// GET /api/tutors/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<TutorProfile> {
    Ok(ApiResponse::success(TutorService::new(&state).get(&user, id).await?))
}

/// PUT /api/tutors/me - Update the caller's own tutor profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<TutorProfile> {
    Ok(ApiResponse::success(TutorService::new(&state).update_profile(&user, req).await?))
}
