// handlers/protected/exams.rs - exams, submissions and grading

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Exam, ExamSubmission};
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::exam_service::{CreateExamRequest, GradeRequest, SubmitExamRequest};
use crate::services::ExamService;

/// POST /api/exams - New draft exam
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateExamRequest>,
) -> ApiResult<Exam> {
    Ok(ApiResponse::created(ExamService::new(&state).create(&user, req).await?))
}

/// GET /api/exams
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Exam>> {
    Ok(ApiResponse::success(ExamService::new(&state).list(&user, &params).await?))
}

/// GET /api/exams/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Exam> {
    Ok(ApiResponse::success(ExamService::new(&state).get(&user, id).await?))
}

/// POST /api/exams/:id/publish
pub async fn publish(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Exam> {
    Ok(ApiResponse::success(ExamService::new(&state).publish(&user, id).await?))
}

/// POST /api/exams/:id/submissions
pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SubmitExamRequest>,
) -> ApiResult<ExamSubmission> {
    Ok(ApiResponse::created(ExamService::new(&state).submit(&user, id, req).await?))
}

/// GET /api/exams/:id/submissions
pub async fn submissions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<ExamSubmission>> {
    Ok(ApiResponse::success(ExamService::new(&state).submissions(&user, id, &params).await?))
}

/// POST /api/submissions/:id/grade
pub async fn grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<GradeRequest>,
) -> ApiResult<ExamSubmission> {
    Ok(ApiResponse::success(ExamService::new(&state).grade(&user, id, req).await?))
}
