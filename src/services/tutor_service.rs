use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::TutorProfile;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{list_page, optional_text, required_text};
use crate::types::TutorStatus;

const TUTOR_SELECT: &str = "SELECT u.id, u.email, u.first_name, u.last_name, t.headline, t.bio, t.subjects, \
     t.hourly_rate, t.status, t.rejection_reason, t.rating, t.review_count, t.created_at";
const TUTOR_FROM: &str = "FROM tutor_profiles t JOIN users u ON u.id = t.user_id";

/// Marketplace directory: approved tutors with active accounts only.
pub static TUTOR_DIRECTORY: ListSpec = ListSpec {
    select: TUTOR_SELECT,
    from: TUTOR_FROM,
    base_where: Some("t.status = 'approved' AND u.status = 'active'"),
    count: "COUNT(*)",
    filters: &[
        FilterField::new("subject", &["t.subjects"], FilterOp::ArrayContains, FieldKind::Text),
        FilterField::new("minRate", &["t.hourly_rate"], FilterOp::Gte, FieldKind::Decimal),
        FilterField::new("maxRate", &["t.hourly_rate"], FilterOp::Lte, FieldKind::Decimal),
        FilterField::new("minRating", &["t.rating"], FilterOp::Gte, FieldKind::Decimal),
        FilterField::search("search", &["u.first_name", "u.last_name", "t.headline", "t.bio"]),
    ],
    sorts: &[
        SortField::new("rating", "t.rating"),
        SortField::new("hourlyRate", "t.hourly_rate"),
        SortField::new("createdAt", "t.created_at"),
    ],
    default_sort: "rating",
    tie_breaker: "u.id",
    default_limit: 20,
};

/// Verification queue seen by admins.
pub static TUTOR_REVIEW: ListSpec = ListSpec {
    select: TUTOR_SELECT,
    from: TUTOR_FROM,
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["t.status"], FilterOp::Eq, FieldKind::OneOf(TutorStatus::ALL)),
        FilterField::search("search", &["u.email", "u.first_name", "u.last_name"]),
    ],
    sorts: &[SortField::new("createdAt", "t.created_at"), SortField::new("hourlyRate", "t.hourly_rate")],
    default_sort: "createdAt",
    tie_breaker: "u.id",
    default_limit: 20,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub hourly_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub struct TutorService<'a> {
    state: &'a AppState,
}

impl<'a> TutorService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn directory(&self, params: &ListParams) -> Result<Page<TutorProfile>, ApiError> {
        list_page(self.state, Filter::new(&TUTOR_DIRECTORY), params).await
    }

    pub async fn review_queue(&self, params: &ListParams) -> Result<Page<TutorProfile>, ApiError> {
        list_page(self.state, Filter::new(&TUTOR_REVIEW), params).await
    }

    /// Approved profiles are public; others are visible to their owner and admins.
    pub async fn get(&self, caller: &AuthUser, tutor_id: Uuid) -> Result<TutorProfile, ApiError> {
        let profile = self.find(tutor_id).await?.ok_or_else(|| ApiError::not_found("Tutor not found"))?;
        let visible = profile.status == TutorStatus::Approved || caller.is_admin() || caller.id == tutor_id;
        if !visible {
            return Err(ApiError::not_found("Tutor not found"));
        }
        Ok(profile)
    }

    pub async fn update_profile(&self, caller: &AuthUser, req: UpdateProfileRequest) -> Result<TutorProfile, ApiError> {
        let headline = optional_text("headline", req.headline.as_deref(), 200)?;
        let bio = optional_text("bio", req.bio.as_deref(), 5000)?;
        let subjects = req.subjects.map(normalize_subjects).transpose()?;
        if let Some(rate) = req.hourly_rate {
            if rate <= Decimal::ZERO {
                return Err(ApiError::invalid_field("hourlyRate", "Hourly rate must be positive"));
            }
        }

        let updated = sqlx::query(
            "UPDATE tutor_profiles SET headline = COALESCE($2, headline), bio = COALESCE($3, bio), \
             subjects = COALESCE($4, subjects), hourly_rate = COALESCE($5, hourly_rate), updated_at = now() \
             WHERE user_id = $1",
        )
        .bind(caller.id)
        .bind(headline)
        .bind(bio)
        .bind(subjects)
        .bind(req.hourly_rate)
        .execute(self.state.db.pool())
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ApiError::not_found("Tutor profile not found"));
        }

        self.state
            .dispatch(Effects::new().activity(NewActivity::new(caller.id, "tutor.profile_update", "tutor", caller.id)))
            .await;
        self.find(caller.id).await?.ok_or_else(|| ApiError::not_found("Tutor profile not found"))
    }

    pub async fn approve(&self, admin: &AuthUser, tutor_id: Uuid) -> Result<TutorProfile, ApiError> {
        let profile = self
            .transition(tutor_id, &[TutorStatus::Pending, TutorStatus::Rejected], TutorStatus::Approved, None)
            .await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(tutor_id, "tutor.approved", "Profile approved", "Your tutor profile is now visible to students")
                    .about("tutor", tutor_id),
            )
            .activity(NewActivity::new(admin.id, "tutor.approve", "tutor", tutor_id));
        self.state.dispatch(effects).await;
        Ok(profile)
    }

    pub async fn reject(&self, admin: &AuthUser, tutor_id: Uuid, req: RejectRequest) -> Result<TutorProfile, ApiError> {
        let reason = required_text("reason", &req.reason, 500)?;
        let profile = self
            .transition(tutor_id, &[TutorStatus::Pending], TutorStatus::Rejected, Some(&reason))
            .await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(tutor_id, "tutor.rejected", "Profile not approved", format!("Your tutor profile was rejected: {}", reason))
                    .about("tutor", tutor_id),
            )
            .activity(NewActivity::new(admin.id, "tutor.reject", "tutor", tutor_id).details(json!({ "reason": reason })));
        self.state.dispatch(effects).await;
        Ok(profile)
    }

    async fn transition(
        &self,
        tutor_id: Uuid,
        from: &[TutorStatus],
        to: TutorStatus,
        reason: Option<&str>,
    ) -> Result<TutorProfile, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM tutor_profiles WHERE user_id = $1 FOR UPDATE")
            .bind(tutor_id)
            .fetch_optional(&mut *tx)
            .await?;
        let status = status.ok_or_else(|| ApiError::not_found("Tutor not found"))?;
        if !from.iter().any(|s| status == *s) {
            return Err(ApiError::conflict(format!("Tutor profile is {} and cannot become {}", status, to)));
        }

        sqlx::query("UPDATE tutor_profiles SET status = $2, rejection_reason = $3, updated_at = now() WHERE user_id = $1")
            .bind(tutor_id)
            .bind(to.as_str())
            .bind(reason)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.find(tutor_id).await?.ok_or_else(|| ApiError::not_found("Tutor not found"))
    }

    async fn find(&self, tutor_id: Uuid) -> Result<Option<TutorProfile>, ApiError> {
        Ok(sqlx::query_as(&format!("{} {} WHERE u.id = $1", TUTOR_SELECT, TUTOR_FROM))
            .bind(tutor_id)
            .fetch_optional(self.state.db.pool())
            .await?)
    }
}

/// Trimmed, lower-cased, de-duplicated subject tags.
fn normalize_subjects(raw: Vec<String>) -> Result<Vec<String>, ApiError> {
    let mut subjects: Vec<String> = Vec::new();
    for subject in raw {
        let subject = subject.trim().to_lowercase();
        if subject.is_empty() {
            continue;
        }
        if subject.chars().count() > 64 {
            return Err(ApiError::invalid_field("subjects", "Subjects must be at most 64 characters"));
        }
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }
    if subjects.len() > 20 {
        return Err(ApiError::invalid_field("subjects", "At most 20 subjects are allowed"));
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn subjects_are_normalized() {
        let subjects = normalize_subjects(vec![" Algebra ".into(), "algebra".into(), "".into(), "Physics".into()]).unwrap();
        assert_eq!(subjects, vec!["algebra", "physics"]);
    }

    #[test]
    fn directory_only_lists_approved_tutors() {
        let params = ListParams::new().filter("subject", "algebra").filter("minRate", "20");
        let filter = Filter::new(&TUTOR_DIRECTORY).assign(&params, &AppConfig::development().filter).unwrap();
        let count = filter.to_count_sql();
        assert!(count.query.contains("WHERE t.status = 'approved' AND u.status = 'active' AND $1 = ANY(t.subjects) AND t.hourly_rate >= $2"));
        assert_eq!(count.params.len(), 2);
    }

    #[test]
    fn directory_defaults_to_rating_desc() {
        let filter = Filter::new(&TUTOR_DIRECTORY).assign(&ListParams::new().sort("bogus", "asc"), &AppConfig::development().filter).unwrap();
        assert!(filter.to_sql().query.contains("ORDER BY t.rating ASC, u.id ASC"));
    }
}
