use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub questions: Value,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExamSubmission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub answers: Value,
    pub score: Option<i32>,
    pub passed: Option<bool>,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}
