use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Dispute, Session};
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{is_unique_violation, list_page, required_text};
use crate::types::DisputeStatus;

pub static DISPUTES: ListSpec = ListSpec {
    select: "SELECT d.*",
    from: "FROM disputes d",
    base_where: None,
    count: "COUNT(*)",
    filters: &[FilterField::new("status", &["d.status"], FilterOp::Eq, FieldKind::OneOf(DisputeStatus::ALL))],
    sorts: &[SortField::new("createdAt", "d.created_at")],
    default_sort: "createdAt",
    tie_breaker: "d.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeRequest {
    pub session_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDisputeRequest {
    pub resolution: String,
    #[serde(default)]
    pub refund: bool,
}

pub struct DisputeService<'a> {
    state: &'a AppState,
}

impl<'a> DisputeService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn open(&self, caller: &AuthUser, req: OpenDisputeRequest) -> Result<Dispute, ApiError> {
        let reason = required_text("reason", &req.reason, 2000)?;

        let mut tx = self.state.db.begin().await?;

        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
            .bind(req.session_id)
            .fetch_optional(&mut *tx)
            .await?;
        let session = session.ok_or_else(|| ApiError::not_found("Session not found"))?;
        if !session.is_participant(caller.id) {
            return Err(ApiError::forbidden("Only session participants can open a dispute"));
        }

        let open: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM disputes WHERE session_id = $1 AND status = 'open')")
            .bind(session.id)
            .fetch_one(&mut *tx)
            .await?;
        if open {
            return Err(ApiError::conflict("An open dispute already exists for this session"));
        }

        let dispute: Dispute = sqlx::query_as(
            "INSERT INTO disputes (id, session_id, raised_by, reason, status) VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session.id)
        .bind(caller.id)
        .bind(&reason)
        .bind(DisputeStatus::Open.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("An open dispute already exists for this session")
            } else {
                e.into()
            }
        })?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    session.counterparty(caller.id),
                    "dispute.opened",
                    "Dispute opened",
                    format!("A dispute was opened for {}", session.subject),
                )
                .about("dispute", dispute.id),
            )
            .activity(NewActivity::new(caller.id, "dispute.open", "dispute", dispute.id).details(json!({ "sessionId": session.id })));
        self.state.dispatch(effects).await;
        Ok(dispute)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Dispute>, ApiError> {
        let filter = if caller.is_admin() {
            Filter::new(&DISPUTES)
        } else {
            Filter::new(&DISPUTES).scope("d.raised_by", caller.id)
        };
        list_page(self.state, filter, params).await
    }

    /// Close an open dispute; with `refund`, the session's completed payment is refunded
    /// in the same transaction.
    pub async fn resolve(&self, admin: &AuthUser, dispute_id: Uuid, req: ResolveDisputeRequest) -> Result<Dispute, ApiError> {
        let resolution = required_text("resolution", &req.resolution, 2000)?;

        let mut tx = self.state.db.begin().await?;

        let dispute: Option<Dispute> = sqlx::query_as("SELECT * FROM disputes WHERE id = $1 FOR UPDATE")
            .bind(dispute_id)
            .fetch_optional(&mut *tx)
            .await?;
        let dispute = dispute.ok_or_else(|| ApiError::not_found("Dispute not found"))?;
        if dispute.status != DisputeStatus::Open {
            return Err(ApiError::conflict("Dispute is already resolved"));
        }

        let refunded_payment: Option<Uuid> = if req.refund {
            sqlx::query_scalar(
                "UPDATE payments SET status = 'refunded', refunded_at = now() \
                 WHERE session_id = $1 AND status = 'completed' RETURNING id",
            )
            .bind(dispute.session_id)
            .fetch_optional(&mut *tx)
            .await?
        } else {
            None
        };

        let dispute: Dispute = sqlx::query_as(
            "UPDATE disputes SET status = $2, resolution = $3, refunded = $4, resolved_by = $5, resolved_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(dispute_id)
        .bind(DisputeStatus::Resolved.as_str())
        .bind(&resolution)
        .bind(refunded_payment.is_some())
        .bind(admin.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        if req.refund && refunded_payment.is_none() {
            tracing::info!("Dispute {} resolved with refund but session has no completed payment", dispute.id);
        }

        let body = if dispute.refunded {
            format!("Your dispute was resolved with a refund: {}", resolution)
        } else {
            format!("Your dispute was resolved: {}", resolution)
        };
        let effects = Effects::new()
            .notify(NewNotification::new(dispute.raised_by, "dispute.resolved", "Dispute resolved", body).about("dispute", dispute.id))
            .activity(
                NewActivity::new(admin.id, "dispute.resolve", "dispute", dispute.id)
                    .details(json!({ "refunded": dispute.refunded, "paymentId": refunded_payment })),
            );
        self.state.dispatch(effects).await;
        Ok(dispute)
    }
}
