// handlers/protected/coupons.rs - GET /api/coupons/:code

use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiPath, ApiResponse, ApiResult};
use crate::services::coupon_service::CouponCheck;
use crate::services::CouponService;

/// GET /api/coupons/:code - Whether a code can be redeemed, and for how much
pub async fn check(State(state): State<AppState>, ApiPath(code): ApiPath<String>) -> ApiResult<CouponCheck> {
    Ok(ApiResponse::success(CouponService::new(&state).check(&code).await?))
}
