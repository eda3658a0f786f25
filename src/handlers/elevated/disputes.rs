// handlers/elevated/disputes.rs

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Dispute;
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::services::dispute_service::ResolveDisputeRequest;
use crate::services::DisputeService;

/// POST /api/admin/disputes/:id/resolve - Close a dispute, optionally refunding the session
pub async fn resolve(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ResolveDisputeRequest>,
) -> ApiResult<Dispute> {
    Ok(ApiResponse::success(DisputeService::new(&state).resolve(&admin, id, req).await?))
}
