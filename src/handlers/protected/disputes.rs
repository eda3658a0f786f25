// handlers/protected/disputes.rs

use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::database::models::Dispute;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::dispute_service::OpenDisputeRequest;
use crate::services::DisputeService;

/// POST /api/disputes
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<OpenDisputeRequest>,
) -> ApiResult<Dispute> {
    Ok(ApiResponse::created(DisputeService::new(&state).open(&user, req).await?))
}

/// GET /api/disputes
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Dispute>> {
    Ok(ApiResponse::success(DisputeService::new(&state).list(&user, &params).await?))
}
