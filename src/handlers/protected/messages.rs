// handlers/protected/messages.rs - direct messages between users

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Message;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::message_service::SendMessageRequest;
use crate::services::MessageService;

/// POST /api/messages
pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<Message> {
    Ok(ApiResponse::created(MessageService::new(&state).send(&user, req).await?))
}

/// GET /api/messages
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Message>> {
    Ok(ApiResponse::success(MessageService::new(&state).list(&user, &params).await?))
}

/// POST /api/messages/:id/read
pub async fn read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Message> {
    Ok(ApiResponse::success(MessageService::new(&state).mark_read(&user, id).await?))
}
