// handlers/elevated/payments.rs - refunds and CSV export

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Payment;
use crate::error::ApiError;
use crate::filter::ListParams;
use crate::middleware::{ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser, CsvResponse};
use crate::services::PaymentService;

/// POST /api/admin/payments/:id/refund
pub async fn refund(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(PaymentService::new(&state).refund(&admin, id).await?))
}

/// GET /api/admin/payments/export - Same filters as the payment list, as a CSV download
pub async fn export(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<CsvResponse, ApiError> {
    let body = PaymentService::new(&state).export_csv(&admin, &params).await?;
    let filename = format!("payments-{}.csv", chrono::Utc::now().format("%Y%m%d"));
    Ok(CsvResponse { filename, body })
}
