use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Why the coupon cannot be redeemed at `now`, if it cannot.
    pub fn unusable_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if !self.is_active {
            return Some("Coupon is no longer active");
        }
        if self.expires_at.map_or(false, |at| at <= now) {
            return Some("Coupon has expired");
        }
        if self.max_uses.map_or(false, |max| self.used_count >= max) {
            return Some("Coupon usage limit reached");
        }
        None
    }
}
