// handlers/elevated/documents.rs

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Document;
use crate::middleware::{ApiJson, ApiPath, ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::ReviewRequest;
use crate::services::DocumentService;

/// POST /api/admin/documents/:id/verify
pub async fn verify(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Document> {
    Ok(ApiResponse::success(DocumentService::new(&state).verify(&admin, id).await?))
}

/// POST /api/admin/documents/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> ApiResult<Document> {
    Ok(ApiResponse::success(DocumentService::new(&state).reject(&admin, id, req).await?))
}
