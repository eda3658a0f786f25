use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Coupon;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity};
use crate::services::{is_unique_violation, list_page};

pub static COUPONS: ListSpec = ListSpec {
    select: "SELECT c.*",
    from: "FROM coupons c",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("isActive", &["c.is_active"], FilterOp::Eq, FieldKind::Bool),
        FilterField::search("search", &["c.code"]),
    ],
    sorts: &[
        SortField::new("createdAt", "c.created_at"),
        SortField::new("code", "c.code"),
        SortField::new("usedCount", "c.used_count"),
    ],
    default_sort: "createdAt",
    tie_breaker: "c.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_percent: i32,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Answer to a coupon lookup; `reason` is set when `valid` is false.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheck {
    pub code: String,
    pub valid: bool,
    pub discount_percent: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub struct CouponService<'a> {
    state: &'a AppState,
}

impl<'a> CouponService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create(&self, admin: &AuthUser, req: CreateCouponRequest) -> Result<Coupon, ApiError> {
        let code = normalize_code(&req.code)?;
        if !(1..=100).contains(&req.discount_percent) {
            return Err(ApiError::invalid_field("discountPercent", "discountPercent must be between 1 and 100"));
        }
        if matches!(req.max_uses, Some(n) if n < 1) {
            return Err(ApiError::invalid_field("maxUses", "maxUses must be at least 1"));
        }
        if matches!(req.expires_at, Some(at) if at <= Utc::now()) {
            return Err(ApiError::invalid_field("expiresAt", "expiresAt must be in the future"));
        }

        let coupon: Coupon = sqlx::query_as(
            "INSERT INTO coupons (id, code, discount_percent, max_uses, expires_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(req.discount_percent)
        .bind(req.max_uses)
        .bind(req.expires_at)
        .bind(admin.id)
        .fetch_one(self.state.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict(format!("Coupon code {} already exists", code))
            } else {
                e.into()
            }
        })?;

        self.state
            .dispatch(Effects::new().activity(
                NewActivity::new(admin.id, "coupon.create", "coupon", coupon.id)
                    .details(json!({ "code": coupon.code, "discountPercent": coupon.discount_percent })),
            ))
            .await;
        Ok(coupon)
    }

    pub async fn list(&self, params: &ListParams) -> Result<Page<Coupon>, ApiError> {
        list_page(self.state, Filter::new(&COUPONS), params).await
    }

    pub async fn deactivate(&self, admin: &AuthUser, coupon_id: Uuid) -> Result<Coupon, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM coupons WHERE id = $1 FOR UPDATE")
            .bind(coupon_id)
            .fetch_optional(&mut *tx)
            .await?;
        match active {
            None => return Err(ApiError::not_found("Coupon not found")),
            Some(false) => return Err(ApiError::conflict("Coupon is already inactive")),
            Some(true) => {}
        }

        let coupon: Coupon = sqlx::query_as("UPDATE coupons SET is_active = FALSE WHERE id = $1 RETURNING *")
            .bind(coupon_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        self.state
            .dispatch(Effects::new().activity(NewActivity::new(admin.id, "coupon.deactivate", "coupon", coupon.id)))
            .await;
        Ok(coupon)
    }

    /// Read-only validity check; redemption happens when a payment is recorded.
    pub async fn check(&self, code: &str) -> Result<CouponCheck, ApiError> {
        let code = normalize_code(code)?;
        let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE code = $1")
            .bind(&code)
            .fetch_optional(self.state.db.pool())
            .await?;
        let coupon = coupon.ok_or_else(|| ApiError::not_found("Coupon not found"))?;
        Ok(check_result(&coupon, Utc::now()))
    }
}

fn check_result(coupon: &Coupon, now: DateTime<Utc>) -> CouponCheck {
    let reason = coupon.unusable_reason(now);
    CouponCheck {
        code: coupon.code.clone(),
        valid: reason.is_none(),
        discount_percent: coupon.discount_percent,
        reason,
    }
}

/// Codes are stored upper-case: 3 to 32 letters, digits, `-` or `_`.
fn normalize_code(raw: &str) -> Result<String, ApiError> {
    let code = raw.trim().to_uppercase();
    let valid_len = (3..=32).contains(&code.len());
    if !valid_len || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ApiError::invalid_field("code", "code must be 3-32 letters, digits, '-' or '_'"));
    }
    Ok(code)
}
