use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Tutor profile joined with its account. `id` is the tutor's user id.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TutorProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub headline: String,
    pub bio: String,
    pub subjects: Vec<String>,
    pub hourly_rate: Decimal,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub doc_type: String,
    pub file_name: String,
    pub file_url: String,
    pub status: String,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
