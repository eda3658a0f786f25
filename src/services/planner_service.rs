use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::PlannerItem;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::services::{list_page, optional_text, required_text};
use crate::types::PlannerItemType;

pub static PLANNER: ListSpec = ListSpec {
    select: "SELECT p.*",
    from: "FROM planner_items p",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("itemType", &["p.item_type"], FilterOp::Eq, FieldKind::OneOf(PlannerItemType::ALL)),
        FilterField::new("completed", &["p.completed"], FilterOp::Eq, FieldKind::Bool),
        FilterField::new("priority", &["p.priority"], FilterOp::Eq, FieldKind::Int),
        FilterField::new("from", &["p.due_date"], FilterOp::Gte, FieldKind::Timestamp),
        FilterField::new("to", &["p.due_date"], FilterOp::Lte, FieldKind::Timestamp),
    ],
    sorts: &[
        SortField::new("dueDate", "p.due_date"),
        SortField::new("createdAt", "p.created_at"),
        SortField::new("priority", "p.priority"),
    ],
    default_sort: "dueDate",
    tie_breaker: "p.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlannerItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub item_type: PlannerItemType,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlannerItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub item_type: Option<PlannerItemType>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
    pub completed: Option<bool>,
}

pub struct PlannerService<'a> {
    state: &'a AppState,
}

impl<'a> PlannerService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreatePlannerItemRequest) -> Result<PlannerItem, ApiError> {
        let title = required_text("title", &req.title, 200)?;
        let description = optional_text("description", req.description.as_deref(), 2000)?;
        validate_priority(req.priority)?;

        let item: PlannerItem = sqlx::query_as(
            "INSERT INTO planner_items (id, user_id, title, description, item_type, due_date, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(caller.id)
        .bind(&title)
        .bind(&description)
        .bind(req.item_type.as_str())
        .bind(req.due_date)
        .bind(req.priority)
        .fetch_one(self.state.db.pool())
        .await?;
        Ok(item)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<PlannerItem>, ApiError> {
        list_page(self.state, Filter::new(&PLANNER).scope("p.user_id", caller.id), params).await
    }

    /// Absent fields keep their stored value. Items owned by someone else are reported missing.
    pub async fn update(&self, caller: &AuthUser, item_id: Uuid, req: UpdatePlannerItemRequest) -> Result<PlannerItem, ApiError> {
        let title = match req.title.as_deref() {
            Some(t) => Some(required_text("title", t, 200)?),
            None => None,
        };
        let description = optional_text("description", req.description.as_deref(), 2000)?;
        if let Some(priority) = req.priority {
            validate_priority(priority)?;
        }

        let item: Option<PlannerItem> = sqlx::query_as(
            "UPDATE planner_items SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                item_type = COALESCE($5, item_type), \
                due_date = COALESCE($6, due_date), \
                priority = COALESCE($7, priority), \
                completed = COALESCE($8, completed), \
                updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(item_id)
        .bind(caller.id)
        .bind(title)
        .bind(description)
        .bind(req.item_type.map(|t| t.as_str()))
        .bind(req.due_date)
        .bind(req.priority)
        .bind(req.completed)
        .fetch_optional(self.state.db.pool())
        .await?;
        item.ok_or_else(|| ApiError::not_found("Planner item not found"))
    }

    pub async fn delete(&self, caller: &AuthUser, item_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM planner_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(caller.id)
            .execute(self.state.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Planner item not found"));
        }
        Ok(())
    }
}

fn validate_priority(priority: i32) -> Result<(), ApiError> {
    if (0..=5).contains(&priority) {
        Ok(())
    } else {
        Err(ApiError::invalid_field("priority", "priority must be between 0 and 5"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::filter::SqlParam;

    #[test]
    fn completed_false_is_a_real_filter() {
        let user = Uuid::new_v4();
        let filter = Filter::new(&PLANNER)
            .scope("p.user_id", user)
            .assign(&ListParams::new().filter("completed", "false"), &AppConfig::development().filter)
            .unwrap();
        let count = filter.to_count_sql();
        assert!(count.query.ends_with("WHERE p.user_id = $1 AND p.completed = $2"));
        assert_eq!(count.params, vec![SqlParam::Uuid(user), SqlParam::Bool(false)]);
    }

    #[test]
    fn update_body_accepts_partial_json() {
        let req: UpdatePlannerItemRequest = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(req.completed, Some(true));
        assert!(req.title.is_none() && req.item_type.is_none());
    }

    #[test]
    fn priority_range() {
        assert!(validate_priority(0).is_ok());
        assert!(validate_priority(5).is_ok());
        assert!(validate_priority(6).is_err());
    }
}
