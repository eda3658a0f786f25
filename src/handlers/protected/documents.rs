// handlers/protected/documents.rs - tutor verification paperwork

use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::database::models::Document;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::CreateDocumentRequest;
use crate::services::DocumentService;

/// POST /api/documents
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateDocumentRequest>,
) -> ApiResult<Document> {
    Ok(ApiResponse::created(DocumentService::new(&state).create(&user, req).await?))
}

/// GET /api/documents - Own documents for tutors, all for admins
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Document>> {
    Ok(ApiResponse::success(DocumentService::new(&state).list(&user, &params).await?))
}
