use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub notes: Option<String>,
    pub status: String,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rating: Option<i32>,
    pub review_comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.student_id == user_id || self.tutor_id == user_id
    }

    /// The other side of the booking, from `user_id`'s point of view.
    pub fn counterparty(&self, user_id: Uuid) -> Uuid {
        if self.student_id == user_id {
            self.tutor_id
        } else {
            self.student_id
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject: String,
    pub amount: Decimal,
    pub discount: Decimal,
    pub coupon_id: Option<Uuid>,
    pub method: String,
    pub status: String,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub id: Uuid,
    pub session_id: Uuid,
    pub raised_by: Uuid,
    pub reason: String,
    pub status: String,
    pub resolution: Option<String>,
    pub refunded: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterparty_is_the_other_participant() {
        let student = Uuid::new_v4();
        let tutor = Uuid::new_v4();
        let session = Session {
            id: Uuid::new_v4(),
            student_id: student,
            tutor_id: tutor,
            subject: "algebra".into(),
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            price: Decimal::new(4000, 2),
            notes: None,
            status: "scheduled".into(),
            cancel_reason: None,
            cancelled_by: None,
            completed_at: None,
            rating: None,
            review_comment: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(session.counterparty(student), tutor);
        assert_eq!(session.counterparty(tutor), student);
        assert!(session.is_participant(tutor));
        assert!(!session.is_participant(Uuid::new_v4()));
    }
}
