use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Exam, ExamSubmission};
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{is_unique_violation, list_page, optional_text, required_text};
use crate::types::{ExamStatus, Role};

pub static EXAMS: ListSpec = ListSpec {
    select: "SELECT e.*",
    from: "FROM exams e",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::search("subject", &["e.subject"]),
        FilterField::new("status", &["e.status"], FilterOp::Eq, FieldKind::OneOf(ExamStatus::ALL)),
        FilterField::new("tutorId", &["e.tutor_id"], FilterOp::Eq, FieldKind::Uuid),
        FilterField::search("search", &["e.title", "e.description"]),
    ],
    sorts: &[SortField::new("createdAt", "e.created_at"), SortField::new("title", "e.title")],
    default_sort: "createdAt",
    tie_breaker: "e.id",
    default_limit: 10,
};

pub static SUBMISSIONS: ListSpec = ListSpec {
    select: "SELECT x.*",
    from: "FROM exam_submissions x",
    base_where: None,
    count: "COUNT(*)",
    filters: &[FilterField::new("graded", &["x.graded_at"], FilterOp::NotNull, FieldKind::Bool)],
    sorts: &[SortField::new("submittedAt", "x.submitted_at"), SortField::new("score", "x.score")],
    default_sort: "submittedAt",
    tie_breaker: "x.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub questions: Value,
    pub duration_minutes: i32,
    pub passing_score: i32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    pub answers: Value,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub score: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct GradingTarget {
    student_id: Uuid,
    exam_id: Uuid,
    graded_at: Option<chrono::DateTime<chrono::Utc>>,
    tutor_id: Uuid,
    passing_score: i32,
    title: String,
}

pub struct ExamService<'a> {
    state: &'a AppState,
}

impl<'a> ExamService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreateExamRequest) -> Result<Exam, ApiError> {
        caller.require_role(&[Role::Tutor])?;
        let title = required_text("title", &req.title, 200)?;
        let subject = required_text("subject", &req.subject, 120)?;
        let description = optional_text("description", req.description.as_deref(), 5000)?;
        match req.questions.as_array() {
            Some(questions) if !questions.is_empty() => {}
            _ => return Err(ApiError::invalid_field("questions", "questions must be a non-empty array")),
        }
        if !(1..=600).contains(&req.duration_minutes) {
            return Err(ApiError::invalid_field("durationMinutes", "durationMinutes must be between 1 and 600"));
        }
        validate_score("passingScore", req.passing_score)?;

        let exam: Exam = sqlx::query_as(
            "INSERT INTO exams (id, tutor_id, title, subject, description, questions, duration_minutes, passing_score, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(caller.id)
        .bind(&title)
        .bind(&subject)
        .bind(&description)
        .bind(&req.questions)
        .bind(req.duration_minutes)
        .bind(req.passing_score)
        .bind(ExamStatus::Draft.as_str())
        .fetch_one(self.state.db.pool())
        .await?;

        self.state
            .dispatch(Effects::new().activity(NewActivity::new(caller.id, "exam.create", "exam", exam.id)))
            .await;
        Ok(exam)
    }

    /// Draft to published, once.
    pub async fn publish(&self, caller: &AuthUser, exam_id: Uuid) -> Result<Exam, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let exam: Option<Exam> = sqlx::query_as("SELECT * FROM exams WHERE id = $1 FOR UPDATE")
            .bind(exam_id)
            .fetch_optional(&mut *tx)
            .await?;
        let exam = exam.ok_or_else(|| ApiError::not_found("Exam not found"))?;
        if exam.tutor_id != caller.id {
            return Err(ApiError::forbidden("Only the exam's tutor can publish it"));
        }
        if exam.status != ExamStatus::Draft {
            return Err(ApiError::conflict("Exam is already published"));
        }

        let exam: Exam = sqlx::query_as(
            "UPDATE exams SET status = $2, published_at = now(), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(exam_id)
        .bind(ExamStatus::Published.as_str())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        self.state
            .dispatch(Effects::new().activity(NewActivity::new(caller.id, "exam.publish", "exam", exam.id)))
            .await;
        Ok(exam)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Exam>, ApiError> {
        let filter = match caller.role {
            Role::Admin => Filter::new(&EXAMS),
            Role::Tutor => Filter::new(&EXAMS).scope("e.tutor_id", caller.id),
            Role::Student => Filter::new(&EXAMS).scope("e.status", ExamStatus::Published.as_str()),
        };
        list_page(self.state, filter, params).await
    }

    /// Drafts are visible to their tutor and admins only.
    pub async fn get(&self, caller: &AuthUser, exam_id: Uuid) -> Result<Exam, ApiError> {
        let exam = self.find(exam_id).await?;
        if exam.status == ExamStatus::Draft && exam.tutor_id != caller.id && !caller.is_admin() {
            return Err(ApiError::not_found("Exam not found"));
        }
        Ok(exam)
    }

    pub async fn submit(&self, caller: &AuthUser, exam_id: Uuid, req: SubmitExamRequest) -> Result<ExamSubmission, ApiError> {
        caller.require_role(&[Role::Student])?;
        if !req.answers.is_array() && !req.answers.is_object() {
            return Err(ApiError::invalid_field("answers", "answers must be an array or object"));
        }

        let exam = self.find(exam_id).await?;
        if exam.status != ExamStatus::Published {
            return Err(ApiError::conflict("Exam is not open for submissions"));
        }

        let mut tx = self.state.db.begin().await?;
        let submitted: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exam_submissions WHERE exam_id = $1 AND student_id = $2)")
            .bind(exam_id)
            .bind(caller.id)
            .fetch_one(&mut *tx)
            .await?;
        if submitted {
            return Err(ApiError::conflict("You have already submitted this exam"));
        }

        let submission: ExamSubmission = sqlx::query_as(
            "INSERT INTO exam_submissions (id, exam_id, student_id, answers) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(exam_id)
        .bind(caller.id)
        .bind(&req.answers)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("You have already submitted this exam")
            } else {
                e.into()
            }
        })?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(exam.tutor_id, "exam.submitted", "New exam submission", format!("A student submitted {}", exam.title))
                    .about("exam_submission", submission.id),
            )
            .activity(NewActivity::new(caller.id, "exam.submit", "exam_submission", submission.id).details(json!({ "examId": exam.id })));
        self.state.dispatch(effects).await;
        Ok(submission)
    }

    pub async fn submissions(&self, caller: &AuthUser, exam_id: Uuid, params: &ListParams) -> Result<Page<ExamSubmission>, ApiError> {
        let exam = self.find(exam_id).await?;
        if exam.tutor_id != caller.id && !caller.is_admin() {
            return Err(ApiError::forbidden("Only the exam's tutor can view submissions"));
        }
        list_page(self.state, Filter::new(&SUBMISSIONS).scope("x.exam_id", exam_id), params).await
    }

    pub async fn grade(&self, caller: &AuthUser, submission_id: Uuid, req: GradeRequest) -> Result<ExamSubmission, ApiError> {
        validate_score("score", req.score)?;
        let feedback = optional_text("feedback", req.feedback.as_deref(), 5000)?;

        let mut tx = self.state.db.begin().await?;

        let target: Option<GradingTarget> = sqlx::query_as(
            "SELECT x.student_id, x.exam_id, x.graded_at, e.tutor_id, e.passing_score, e.title \
             FROM exam_submissions x JOIN exams e ON e.id = x.exam_id \
             WHERE x.id = $1 FOR UPDATE OF x",
        )
        .bind(submission_id)
        .fetch_optional(&mut *tx)
        .await?;
        let target = target.ok_or_else(|| ApiError::not_found("Submission not found"))?;
        if target.tutor_id != caller.id {
            return Err(ApiError::forbidden("Only the exam's tutor can grade submissions"));
        }
        if target.graded_at.is_some() {
            return Err(ApiError::conflict("Submission has already been graded"));
        }

        let passed = req.score >= target.passing_score;
        let submission: ExamSubmission = sqlx::query_as(
            "UPDATE exam_submissions SET score = $2, passed = $3, feedback = $4, graded_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(submission_id)
        .bind(req.score)
        .bind(passed)
        .bind(&feedback)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let outcome = if passed { "passed" } else { "did not pass" };
        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    target.student_id,
                    "exam.graded",
                    "Exam graded",
                    format!("You scored {} on {} and {}", req.score, target.title, outcome),
                )
                .about("exam_submission", submission.id),
            )
            .activity(
                NewActivity::new(caller.id, "exam.grade", "exam_submission", submission.id)
                    .details(json!({ "examId": target.exam_id, "score": req.score, "passed": passed })),
            );
        self.state.dispatch(effects).await;
        Ok(submission)
    }

    async fn find(&self, exam_id: Uuid) -> Result<Exam, ApiError> {
        let exam: Option<Exam> = sqlx::query_as("SELECT * FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(self.state.db.pool())
            .await?;
        exam.ok_or_else(|| ApiError::not_found("Exam not found"))
    }
}

fn validate_score(field: &str, score: i32) -> Result<(), ApiError> {
    if (0..=100).contains(&score) {
        Ok(())
    } else {
        Err(ApiError::invalid_field(field, format!("{} must be between 0 and 100", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::filter::SqlParam;

    #[test]
    fn graded_filter_binds_nothing() {
        let filter = Filter::new(&SUBMISSIONS)
            .scope("x.exam_id", Uuid::nil())
            .assign(&ListParams::new().filter("graded", "false"), &AppConfig::development().filter)
            .unwrap();
        let count = filter.to_count_sql();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM exam_submissions x WHERE x.exam_id = $1 AND x.graded_at IS NULL"
        );
        assert_eq!(count.params, vec![SqlParam::Uuid(Uuid::nil())]);
    }

    #[test]
    fn exams_default_to_ten_per_page() {
        let filter = Filter::new(&EXAMS).assign(&ListParams::new(), &AppConfig::development().filter).unwrap();
        assert_eq!(filter.limit(), 10);
    }

    #[test]
    fn score_bounds() {
        assert!(validate_score("score", 0).is_ok());
        assert!(validate_score("score", 100).is_ok());
        assert!(validate_score("score", 101).is_err());
        assert!(validate_score("score", -1).is_err());
    }
}
