// handlers/protected/sessions.rs - booking lifecycle

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Session;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::session_service::{BookSessionRequest, CancelSessionRequest, ReviewSessionRequest};
use crate::services::SessionService;

/// POST /api/sessions - Book a slot with an approved tutor
pub async fn book(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<BookSessionRequest>,
) -> ApiResult<Session> {
    let session = SessionService::new(&state).book(&user, req).await?;
    Ok(ApiResponse::created(session).with_message("Session booked"))
}

/// GET /api/sessions
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Session>> {
    Ok(ApiResponse::success(SessionService::new(&state).list(&user, &params).await?))
}

/// GET /api/sessions/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Session> {
    Ok(ApiResponse::success(SessionService::new(&state).get(&user, id).await?))
}

/// POST /api/sessions/:id/cancel - Body is optional
pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    body: Option<ApiJson<CancelSessionRequest>>,
) -> ApiResult<Session> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    Ok(ApiResponse::success(SessionService::new(&state).cancel(&user, id, req).await?))
}

/// POST /api/sessions/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Session> {
    Ok(ApiResponse::success(SessionService::new(&state).complete(&user, id).await?))
}

/// POST /api/sessions/:id/review
pub async fn review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReviewSessionRequest>,
) -> ApiResult<Session> {
    Ok(ApiResponse::success(SessionService::new(&state).review(&user, id, req).await?))
}
