// handlers/protected/payments.rs

use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::database::models::Payment;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::payment_service::CreatePaymentRequest;
use crate::services::PaymentService;

/// POST /api/payments - Pay for a session, optionally with a coupon
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::created(PaymentService::new(&state).create(&user, req).await?))
}

/// GET /api/payments - Student spend, tutor earnings, or everything for admins
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Page<Payment>> {
    Ok(ApiResponse::success(PaymentService::new(&state).list(&user, &params).await?))
}
