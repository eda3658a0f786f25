use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Notification;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::services::list_page;

pub static NOTIFICATIONS: ListSpec = ListSpec {
    select: "SELECT n.*",
    from: "FROM notifications n",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("isRead", &["n.is_read"], FilterOp::Eq, FieldKind::Bool),
        FilterField::new("kind", &["n.kind"], FilterOp::Eq, FieldKind::Text),
    ],
    sorts: &[SortField::new("createdAt", "n.created_at")],
    default_sort: "createdAt",
    tie_breaker: "n.id",
    default_limit: 20,
};

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub struct NotificationService<'a> {
    state: &'a AppState,
}

impl<'a> NotificationService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Notification>, ApiError> {
        list_page(self.state, Filter::new(&NOTIFICATIONS).scope("n.user_id", caller.id), params).await
    }

    pub async fn mark_read(&self, caller: &AuthUser, notification_id: Uuid) -> Result<Notification, ApiError> {
        let notification: Option<Notification> =
            sqlx::query_as("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *")
                .bind(notification_id)
                .bind(caller.id)
                .fetch_optional(self.state.db.pool())
                .await?;
        notification.ok_or_else(|| ApiError::not_found("Notification not found"))
    }

    pub async fn mark_all_read(&self, caller: &AuthUser) -> Result<MarkedRead, ApiError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(caller.id)
            .execute(self.state.db.pool())
            .await?;
        Ok(MarkedRead { updated: result.rows_affected() })
    }
}
