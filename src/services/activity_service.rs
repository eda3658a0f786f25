use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::app::AppState;
use crate::database::models::ActivityEntry;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::services::list_page;

pub static ACTIVITY: ListSpec = ListSpec {
    select: "SELECT a.*",
    from: "FROM activity_log a",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("action", &["a.action"], FilterOp::Eq, FieldKind::Text),
        FilterField::new("actorId", &["a.actor_id"], FilterOp::Eq, FieldKind::Uuid),
        FilterField::new("entityType", &["a.entity_type"], FilterOp::Eq, FieldKind::Text),
        FilterField::new("from", &["a.created_at"], FilterOp::Gte, FieldKind::Timestamp),
        FilterField::new("to", &["a.created_at"], FilterOp::Lte, FieldKind::Timestamp),
    ],
    sorts: &[SortField::new("createdAt", "a.created_at")],
    default_sort: "createdAt",
    tie_breaker: "a.id",
    default_limit: 50,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBreakdown {
    pub total: i64,
    pub by_role: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Revenue {
    pub gross: Decimal,
    pub refunded: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub users: UserBreakdown,
    pub tutors: BTreeMap<String, i64>,
    pub sessions: BTreeMap<String, i64>,
    pub revenue: Revenue,
    pub open_disputes: i64,
}

pub struct ActivityService<'a> {
    state: &'a AppState,
}

impl<'a> ActivityService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, params: &ListParams) -> Result<Page<ActivityEntry>, ApiError> {
        list_page(self.state, Filter::new(&ACTIVITY), params).await
    }

    /// Platform-wide counters for the admin dashboard.
    pub async fn overview(&self) -> Result<Overview, ApiError> {
        let pool = self.state.db.pool();

        let users = sqlx::query_as::<_, (String, String, i64)>("SELECT role, status, COUNT(*) FROM users GROUP BY role, status")
            .fetch_all(pool);
        let tutors = sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM tutor_profiles GROUP BY status").fetch_all(pool);
        let sessions = sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM sessions GROUP BY status").fetch_all(pool);
        let revenue = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(amount) FILTER (WHERE status = 'refunded'), 0) FROM payments",
        )
        .fetch_one(pool);
        let open_disputes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM disputes WHERE status = 'open'").fetch_one(pool);

        let (users, tutors, sessions, (gross, refunded), open_disputes) =
            tokio::try_join!(users, tutors, sessions, revenue, open_disputes)?;

        Ok(Overview {
            users: user_breakdown(&users),
            tutors: tutors.into_iter().collect(),
            sessions: sessions.into_iter().collect(),
            revenue: Revenue { gross, refunded, net: gross - refunded },
            open_disputes,
        })
    }
}

fn user_breakdown(rows: &[(String, String, i64)]) -> UserBreakdown {
    let mut breakdown = UserBreakdown::default();
    for (role, status, count) in rows {
        breakdown.total += count;
        *breakdown.by_role.entry(role.clone()).or_default() += count;
        *breakdown.by_status.entry(status.clone()).or_default() += count;
    }
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rows_fold_into_both_breakdowns() {
        let rows = vec![
            ("student".to_string(), "active".to_string(), 5),
            ("student".to_string(), "suspended".to_string(), 1),
            ("tutor".to_string(), "active".to_string(), 3),
        ];
        let b = user_breakdown(&rows);
        assert_eq!(b.total, 9);
        assert_eq!(b.by_role["student"], 6);
        assert_eq!(b.by_role["tutor"], 3);
        assert_eq!(b.by_status["active"], 8);
        assert_eq!(b.by_status["suspended"], 1);
    }

    #[test]
    fn overview_serializes_camel_case() {
        let overview = Overview {
            users: UserBreakdown::default(),
            tutors: BTreeMap::new(),
            sessions: BTreeMap::new(),
            revenue: Revenue::default(),
            open_disputes: 2,
        };
        let v = serde_json::to_value(&overview).unwrap();
        assert_eq!(v["openDisputes"], 2);
        assert!(v["users"]["byRole"].is_object());
    }
}
