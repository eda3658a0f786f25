use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Session;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{is_unique_violation, list_page, optional_text, required_text};
use crate::types::{Role, SessionStatus, TutorStatus, UserStatus};

pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 480;

const SESSION_SORTS: &[SortField] = &[
    SortField::new("scheduledAt", "s.scheduled_at"),
    SortField::new("createdAt", "s.created_at"),
    SortField::new("price", "s.price"),
];

/// Sessions of one participant.
pub static OWN_SESSIONS: ListSpec = ListSpec {
    select: "SELECT s.*",
    from: "FROM sessions s",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["s.status"], FilterOp::Eq, FieldKind::OneOf(SessionStatus::ALL)),
        FilterField::search("subject", &["s.subject"]),
        FilterField::new("from", &["s.scheduled_at"], FilterOp::Gte, FieldKind::Timestamp),
        FilterField::new("to", &["s.scheduled_at"], FilterOp::Lte, FieldKind::Timestamp),
    ],
    sorts: SESSION_SORTS,
    default_sort: "scheduledAt",
    tie_breaker: "s.id",
    default_limit: 20,
};

pub static ALL_SESSIONS: ListSpec = ListSpec {
    select: "SELECT s.*",
    from: "FROM sessions s",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["s.status"], FilterOp::Eq, FieldKind::OneOf(SessionStatus::ALL)),
        FilterField::search("subject", &["s.subject"]),
        FilterField::new("from", &["s.scheduled_at"], FilterOp::Gte, FieldKind::Timestamp),
        FilterField::new("to", &["s.scheduled_at"], FilterOp::Lte, FieldKind::Timestamp),
        FilterField::new("tutorId", &["s.tutor_id"], FilterOp::Eq, FieldKind::Uuid),
        FilterField::new("studentId", &["s.student_id"], FilterOp::Eq, FieldKind::Uuid),
    ],
    sorts: SESSION_SORTS,
    default_sort: "scheduledAt",
    tie_breaker: "s.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSessionRequest {
    pub tutor_id: Uuid,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelSessionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewSessionRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct BookableTutor {
    status: String,
    account_status: String,
    hourly_rate: Decimal,
}

pub struct SessionService<'a> {
    state: &'a AppState,
}

impl<'a> SessionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Book a slot with an approved tutor.
    ///
    /// The tutor's profile row stays locked until commit, so bookings for one tutor
    /// serialize and the later one sees the earlier row. The partial unique index on
    /// `(tutor_id, scheduled_at)` rejects any writer that skips the lock.
    pub async fn book(&self, caller: &AuthUser, req: BookSessionRequest) -> Result<Session, ApiError> {
        caller.require_role(&[Role::Student])?;
        let subject = required_text("subject", &req.subject, 120)?;
        let notes = optional_text("notes", req.notes.as_deref(), 2000)?;
        validate_duration(req.duration_minutes)?;
        if req.scheduled_at <= Utc::now() {
            return Err(ApiError::invalid_field("scheduledAt", "scheduledAt must be in the future"));
        }
        if req.tutor_id == caller.id {
            return Err(ApiError::invalid_field("tutorId", "You cannot book yourself"));
        }

        let mut tx = self.state.db.begin().await?;

        let tutor: Option<BookableTutor> = sqlx::query_as(
            "SELECT t.status, u.status AS account_status, t.hourly_rate \
             FROM tutor_profiles t JOIN users u ON u.id = t.user_id \
             WHERE t.user_id = $1 FOR UPDATE OF t",
        )
        .bind(req.tutor_id)
        .fetch_optional(&mut *tx)
        .await?;
        let tutor = tutor.ok_or_else(|| ApiError::not_found("Tutor not found"))?;
        if tutor.status != TutorStatus::Approved || tutor.account_status != UserStatus::Active {
            return Err(ApiError::conflict("Tutor is not available for booking"));
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE tutor_id = $1 AND scheduled_at = $2 AND status = 'scheduled')",
        )
        .bind(req.tutor_id)
        .bind(req.scheduled_at)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(ApiError::conflict("Tutor already has a session at this time"));
        }

        let session: Session = sqlx::query_as(
            "INSERT INTO sessions (id, student_id, tutor_id, subject, scheduled_at, duration_minutes, price, notes, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(caller.id)
        .bind(req.tutor_id)
        .bind(&subject)
        .bind(req.scheduled_at)
        .bind(req.duration_minutes)
        .bind(session_price(tutor.hourly_rate, req.duration_minutes))
        .bind(notes)
        .bind(SessionStatus::Scheduled.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("Tutor already has a session at this time")
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        tracing::info!("Session {} booked with tutor {}", session.id, session.tutor_id);

        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    session.tutor_id,
                    "session.booked",
                    "New session booked",
                    format!("{} on {}", session.subject, session.scheduled_at.format("%Y-%m-%d %H:%M UTC")),
                )
                .about("session", session.id),
            )
            .activity(
                NewActivity::new(caller.id, "session.book", "session", session.id)
                    .details(json!({ "tutorId": session.tutor_id, "price": session.price })),
            );
        self.state.dispatch(effects).await;
        Ok(session)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Session>, ApiError> {
        let filter = match caller.role {
            Role::Admin => Filter::new(&ALL_SESSIONS),
            Role::Tutor => Filter::new(&OWN_SESSIONS).scope("s.tutor_id", caller.id),
            Role::Student => Filter::new(&OWN_SESSIONS).scope("s.student_id", caller.id),
        };
        list_page(self.state, filter, params).await
    }

    pub async fn get(&self, caller: &AuthUser, session_id: Uuid) -> Result<Session, ApiError> {
        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(self.state.db.pool())
            .await?;
        let session = session.ok_or_else(|| ApiError::not_found("Session not found"))?;
        ensure_participant(caller, &session)?;
        Ok(session)
    }

    pub async fn cancel(&self, caller: &AuthUser, session_id: Uuid, req: CancelSessionRequest) -> Result<Session, ApiError> {
        let reason = optional_text("reason", req.reason.as_deref(), 500)?;

        let mut tx = self.state.db.begin().await?;
        let session = lock_session(&mut tx, session_id).await?;
        ensure_participant(caller, &session)?;
        ensure_scheduled(&session)?;

        let session: Session = sqlx::query_as(
            "UPDATE sessions SET status = $2, cancel_reason = $3, cancelled_by = $4, updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(session_id)
        .bind(SessionStatus::Cancelled.as_str())
        .bind(&reason)
        .bind(caller.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let recipients: Vec<Uuid> = if session.is_participant(caller.id) {
            vec![session.counterparty(caller.id)]
        } else {
            vec![session.student_id, session.tutor_id]
        };
        let body = match &reason {
            Some(r) => format!("{} on {} was cancelled: {}", session.subject, session.scheduled_at.format("%Y-%m-%d"), r),
            None => format!("{} on {} was cancelled", session.subject, session.scheduled_at.format("%Y-%m-%d")),
        };
        let mut effects = Effects::new();
        for user in recipients {
            effects = effects.notify(NewNotification::new(user, "session.cancelled", "Session cancelled", body.clone()).about("session", session.id));
        }
        effects = effects.activity(NewActivity::new(caller.id, "session.cancel", "session", session.id).details(json!({ "reason": reason })));
        self.state.dispatch(effects).await;
        Ok(session)
    }

    pub async fn complete(&self, caller: &AuthUser, session_id: Uuid) -> Result<Session, ApiError> {
        let mut tx = self.state.db.begin().await?;
        let session = lock_session(&mut tx, session_id).await?;
        if session.tutor_id != caller.id {
            return Err(ApiError::forbidden("Only the session's tutor can mark it completed"));
        }
        ensure_scheduled(&session)?;

        let session: Session = sqlx::query_as(
            "UPDATE sessions SET status = $2, completed_at = now(), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(session_id)
        .bind(SessionStatus::Completed.as_str())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(session.student_id, "session.completed", "Session completed", format!("{} is complete, leave a review", session.subject))
                    .about("session", session.id),
            )
            .activity(NewActivity::new(caller.id, "session.complete", "session", session.id));
        self.state.dispatch(effects).await;
        Ok(session)
    }

    /// Record the student's rating and refresh the tutor's aggregate in the same transaction.
    pub async fn review(&self, caller: &AuthUser, session_id: Uuid, req: ReviewSessionRequest) -> Result<Session, ApiError> {
        if !(1..=5).contains(&req.rating) {
            return Err(ApiError::invalid_field("rating", "rating must be between 1 and 5"));
        }
        let comment = optional_text("comment", req.comment.as_deref(), 2000)?;

        let mut tx = self.state.db.begin().await?;
        let session = lock_session(&mut tx, session_id).await?;
        if session.student_id != caller.id {
            return Err(ApiError::forbidden("Only the session's student can review it"));
        }
        if session.status != SessionStatus::Completed {
            return Err(ApiError::conflict("Only completed sessions can be reviewed"));
        }
        if session.rating.is_some() {
            return Err(ApiError::conflict("Session has already been reviewed"));
        }

        let session: Session = sqlx::query_as(
            "UPDATE sessions SET rating = $2, review_comment = $3, reviewed_at = now(), updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(session_id)
        .bind(req.rating)
        .bind(&comment)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE tutor_profiles SET \
               rating = COALESCE((SELECT ROUND(AVG(rating)::numeric, 2) FROM sessions WHERE tutor_id = $1 AND rating IS NOT NULL), 0), \
               review_count = (SELECT COUNT(*) FROM sessions WHERE tutor_id = $1 AND rating IS NOT NULL), \
               updated_at = now() \
             WHERE user_id = $1",
        )
        .bind(session.tutor_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(session.tutor_id, "session.reviewed", "New review", format!("You received a {}-star review", req.rating))
                    .about("session", session.id),
            )
            .activity(NewActivity::new(caller.id, "session.review", "session", session.id).details(json!({ "rating": req.rating })));
        self.state.dispatch(effects).await;
        Ok(session)
    }
}

async fn lock_session(tx: &mut Transaction<'static, Postgres>, session_id: Uuid) -> Result<Session, ApiError> {
    let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?;
    session.ok_or_else(|| ApiError::not_found("Session not found"))
}

fn ensure_participant(caller: &AuthUser, session: &Session) -> Result<(), ApiError> {
    if caller.is_admin() || session.is_participant(caller.id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You are not a participant in this session"))
    }
}

fn ensure_scheduled(session: &Session) -> Result<(), ApiError> {
    if session.status == SessionStatus::Scheduled {
        Ok(())
    } else {
        Err(ApiError::conflict(format!("Session is already {}", session.status)))
    }
}

fn validate_duration(minutes: i32) -> Result<(), ApiError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ApiError::invalid_field(
            "durationMinutes",
            format!("durationMinutes must be between {} and {}", MIN_DURATION_MINUTES, MAX_DURATION_MINUTES),
        ))
    }
}

/// `hourly_rate * minutes / 60`, rounded to cents.
pub fn session_price(hourly_rate: Decimal, minutes: i32) -> Decimal {
    (hourly_rate * Decimal::from(minutes) / Decimal::from(60)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn price_is_prorated_to_cents() {
        let rate = Decimal::from_str("45.00").unwrap();
        assert_eq!(session_price(rate, 60), Decimal::from_str("45.00").unwrap());
        assert_eq!(session_price(rate, 90), Decimal::from_str("67.50").unwrap());
        assert_eq!(session_price(Decimal::from_str("10.00").unwrap(), 25), Decimal::from_str("4.17").unwrap());
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        assert!(validate_duration(15).is_ok());
        assert!(validate_duration(480).is_ok());
        assert!(validate_duration(14).is_err());
        assert!(validate_duration(481).is_err());
    }

    #[test]
    fn book_request_parses_rfc3339() {
        let req: BookSessionRequest = serde_json::from_value(json!({
            "tutorId": Uuid::nil(),
            "subject": "algebra",
            "scheduledAt": "2030-01-01T10:00:00Z",
            "durationMinutes": 60
        }))
        .unwrap();
        assert_eq!(req.duration_minutes, 60);
        assert!(req.notes.is_none());
    }
}
