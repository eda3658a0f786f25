// handlers/protected/planner.rs - personal study planner

use axum::extract::{Extension, State};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::PlannerItem;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::planner_service::{CreatePlannerItemRequest, UpdatePlannerItemRequest};
use crate::services::PlannerService;

/// POST /api/planner
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePlannerItemRequest>,
) -> ApiResult<PlannerItem> {
    Ok(ApiResponse::created(PlannerService::new(&state).create(&user, req).await?))
}

/// GET /api/planner
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<PlannerItem>> {
    Ok(ApiResponse::success(PlannerService::new(&state).list(&user, &params).await?))
}

/// PATCH /api/planner/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePlannerItemRequest>,
) -> ApiResult<PlannerItem> {
    Ok(ApiResponse::success(PlannerService::new(&state).update(&user, id, req).await?))
}

/// DELETE /api/planner/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Value> {
    PlannerService::new(&state).delete(&user, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
