// Domain services: each mutation validates, runs its statements in one transaction,
// commits, then hands its side effects to the post-commit pipeline.

pub mod activity_service;
pub mod coupon_service;
pub mod dispute_service;
pub mod document_service;
pub mod exam_service;
pub mod message_service;
pub mod notification_service;
pub mod payment_service;
pub mod planner_service;
pub mod session_service;
pub mod tutor_service;
pub mod user_service;

use sqlx::{postgres::PgRow, FromRow};

use crate::app::AppState;
use crate::database::fetch_page;
use crate::error::ApiError;
use crate::filter::{Filter, ListParams, Page};

pub use activity_service::ActivityService;
pub use coupon_service::CouponService;
pub use dispute_service::DisputeService;
pub use document_service::DocumentService;
pub use exam_service::ExamService;
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use payment_service::PaymentService;
pub use planner_service::PlannerService;
pub use session_service::SessionService;
pub use tutor_service::TutorService;
pub use user_service::UserService;

/// Apply the caller's list parameters and run the data/count pair.
pub(crate) async fn list_page<T>(state: &AppState, filter: Filter, params: &ListParams) -> Result<Page<T>, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let filter = filter.assign(params, &state.config.filter)?;
    Ok(fetch_page(&state.db, &filter).await?)
}

/// SQLSTATE 23505, raised when a concurrent writer won a unique slot first.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Trimmed, non-empty text of at most `max` characters.
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::invalid_field(field, format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::invalid_field(field, format!("{} must be at most {} characters", field, max)));
    }
    Ok(value.to_string())
}

/// Like `required_text`, but absent or blank input is `None`.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => required_text(field, v, max).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("reason", "  late  ", 10).unwrap(), "late");
        assert!(required_text("reason", "   ", 10).is_err());
        assert!(required_text("reason", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn optional_text_treats_blank_as_absent() {
        assert_eq!(optional_text("notes", None, 10).unwrap(), None);
        assert_eq!(optional_text("notes", Some("  "), 10).unwrap(), None);
        assert_eq!(optional_text("notes", Some(" hi "), 10).unwrap(), Some("hi".to_string()));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
