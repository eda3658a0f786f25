// handlers/elevated/coupons.rs

use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Coupon;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AuthUser};
use crate::services::coupon_service::CreateCouponRequest;
use crate::services::CouponService;

/// POST /api/admin/coupons
pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateCouponRequest>,
) -> ApiResult<Coupon> {
    Ok(ApiResponse::created(CouponService::new(&state).create(&admin, req).await?))
}

/// GET /api/admin/coupons
pub async fn list(State(state): State<AppState>, ApiQuery(params): ApiQuery<ListParams>) -> ApiResult<Page<Coupon>> {
    Ok(ApiResponse::success(CouponService::new(&state).list(&params).await?))
}

/// POST /api/admin/coupons/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Coupon> {
    Ok(ApiResponse::success(CouponService::new(&state).deactivate(&admin, id).await?))
}
