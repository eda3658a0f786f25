// handlers/elevated/analytics.rs - dashboard counters and the activity log

use axum::extract::State;

use crate::app::AppState;
use crate::database::models::ActivityEntry;
use crate::filter::{ListParams, Page};
use crate::middleware::{ApiQuery, ApiResponse, ApiResult};
use crate::services::activity_service::Overview;
use crate::services::ActivityService;

/// GET /api/admin/analytics/overview
pub async fn overview(State(state): State<AppState>) -> ApiResult<Overview> {
    Ok(ApiResponse::success(ActivityService::new(&state).overview().await?))
}

/// GET /api/admin/activity
pub async fn activity(State(state): State<AppState>, ApiQuery(params): ApiQuery<ListParams>) -> ApiResult<Page<ActivityEntry>> {
    Ok(ApiResponse::success(ActivityService::new(&state).list(&params).await?))
}
