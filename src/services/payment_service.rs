use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Coupon, Payment, Session};
use crate::database::fetch_export;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{is_unique_violation, list_page};
use crate::types::{PaymentMethod, PaymentStatus, Role, SessionStatus};

const PAYMENT_SELECT: &str = "SELECT p.id, p.session_id, p.student_id, s.tutor_id, s.subject, p.amount, p.discount, \
     p.coupon_id, p.method, p.status, p.refunded_at, p.created_at";
const PAYMENT_FROM: &str = "FROM payments p JOIN sessions s ON s.id = p.session_id";

pub static PAYMENTS: ListSpec = ListSpec {
    select: PAYMENT_SELECT,
    from: PAYMENT_FROM,
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("status", &["p.status"], FilterOp::Eq, FieldKind::OneOf(PaymentStatus::ALL)),
        FilterField::new("method", &["p.method"], FilterOp::Eq, FieldKind::OneOf(PaymentMethod::ALL)),
        FilterField::new("from", &["p.created_at"], FilterOp::Gte, FieldKind::Timestamp),
        FilterField::new("to", &["p.created_at"], FilterOp::Lte, FieldKind::Timestamp),
    ],
    sorts: &[SortField::new("createdAt", "p.created_at"), SortField::new("amount", "p.amount")],
    default_sort: "createdAt",
    tie_breaker: "p.id",
    default_limit: 20,
};

const CSV_HEADER: &str = "id,sessionId,studentId,tutorId,subject,amount,discount,method,status,createdAt,refundedAt";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub session_id: Uuid,
    pub coupon_code: Option<String>,
    pub method: PaymentMethod,
}

pub struct PaymentService<'a> {
    state: &'a AppState,
}

impl<'a> PaymentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Record a completed payment for the caller's session. Coupon redemption and the
    /// payment row commit together.
    pub async fn create(&self, caller: &AuthUser, req: CreatePaymentRequest) -> Result<Payment, ApiError> {
        caller.require_role(&[Role::Student])?;

        let mut tx = self.state.db.begin().await?;

        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
            .bind(req.session_id)
            .fetch_optional(&mut *tx)
            .await?;
        let session = session.ok_or_else(|| ApiError::not_found("Session not found"))?;
        if session.student_id != caller.id {
            return Err(ApiError::forbidden("You can only pay for your own sessions"));
        }
        if session.status == SessionStatus::Cancelled {
            return Err(ApiError::conflict("Cancelled sessions cannot be paid"));
        }

        let paid: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM payments WHERE session_id = $1 AND status = 'completed')")
            .bind(session.id)
            .fetch_one(&mut *tx)
            .await?;
        if paid {
            return Err(ApiError::conflict("Session is already paid"));
        }

        let coupon = match req.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(redeem_coupon(&mut tx, code).await?),
            None => None,
        };
        let discount = coupon.as_ref().map_or(Decimal::ZERO, |c| discount_for(session.price, c.discount_percent));

        let payment_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO payments (id, session_id, student_id, amount, discount, coupon_id, method, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment_id)
        .bind(session.id)
        .bind(caller.id)
        .bind(session.price - discount)
        .bind(discount)
        .bind(coupon.as_ref().map(|c| c.id))
        .bind(req.method.as_str())
        .bind(PaymentStatus::Completed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { ApiError::conflict("Session is already paid") } else { e.into() })?;

        let payment = fetch_payment(&mut tx, payment_id).await?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    payment.tutor_id,
                    "payment.received",
                    "Payment received",
                    format!("Payment of {} received for {}", payment.amount, payment.subject),
                )
                .about("payment", payment.id),
            )
            .activity(
                NewActivity::new(caller.id, "payment.create", "payment", payment.id).details(json!({
                    "sessionId": payment.session_id,
                    "amount": payment.amount,
                    "coupon": coupon.as_ref().map(|c| c.code.clone()),
                })),
            );
        self.state.dispatch(effects).await;
        Ok(payment)
    }

    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Payment>, ApiError> {
        list_page(self.state, self.scoped(caller), params).await
    }

    pub async fn refund(&self, admin: &AuthUser, payment_id: Uuid) -> Result<Payment, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status {
            None => return Err(ApiError::not_found("Payment not found")),
            Some(s) if s != PaymentStatus::Completed => return Err(ApiError::conflict(format!("Payment is already {}", s))),
            Some(_) => {}
        }

        sqlx::query("UPDATE payments SET status = $2, refunded_at = now() WHERE id = $1")
            .bind(payment_id)
            .bind(PaymentStatus::Refunded.as_str())
            .execute(&mut *tx)
            .await?;
        let payment = fetch_payment(&mut tx, payment_id).await?;
        tx.commit().await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(
                    payment.student_id,
                    "payment.refunded",
                    "Payment refunded",
                    format!("Your payment of {} for {} was refunded", payment.amount, payment.subject),
                )
                .about("payment", payment.id),
            )
            .activity(NewActivity::new(admin.id, "payment.refund", "payment", payment.id).details(json!({ "amount": payment.amount })));
        self.state.dispatch(effects).await;
        Ok(payment)
    }

    /// Every payment matching the list filters, as CSV, capped at `filter.max_export_rows`.
    pub async fn export_csv(&self, caller: &AuthUser, params: &ListParams) -> Result<String, ApiError> {
        let filter = self.scoped(caller).assign(params, &self.state.config.filter)?;
        let rows: Vec<Payment> = fetch_export(&self.state.db, &filter, self.state.config.filter.max_export_rows).await?;
        tracing::info!("Exporting {} payments", rows.len());
        Ok(payments_to_csv(&rows))
    }

    fn scoped(&self, caller: &AuthUser) -> Filter {
        match caller.role {
            Role::Admin => Filter::new(&PAYMENTS),
            Role::Tutor => Filter::new(&PAYMENTS).scope("s.tutor_id", caller.id),
            Role::Student => Filter::new(&PAYMENTS).scope("p.student_id", caller.id),
        }
    }
}

async fn fetch_payment(tx: &mut Transaction<'static, Postgres>, payment_id: Uuid) -> Result<Payment, ApiError> {
    Ok(sqlx::query_as(&format!("{} {} WHERE p.id = $1", PAYMENT_SELECT, PAYMENT_FROM))
        .bind(payment_id)
        .fetch_one(&mut **tx)
        .await?)
}

/// Lock, validate and count one use of a coupon.
async fn redeem_coupon(tx: &mut Transaction<'static, Postgres>, code: &str) -> Result<Coupon, ApiError> {
    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE code = $1 FOR UPDATE")
        .bind(code.to_uppercase())
        .fetch_optional(&mut **tx)
        .await?;
    let coupon = coupon.ok_or_else(|| ApiError::invalid_field("couponCode", "Coupon not found"))?;
    if let Some(reason) = coupon.unusable_reason(chrono::Utc::now()) {
        return Err(ApiError::conflict(reason));
    }

    sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
        .bind(coupon.id)
        .execute(&mut **tx)
        .await?;
    Ok(coupon)
}

/// `price * percent / 100`, rounded to cents.
pub fn discount_for(price: Decimal, percent: i32) -> Decimal {
    (price * Decimal::from(percent) / Decimal::from(100)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn payments_to_csv(rows: &[Payment]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for p in rows {
        let fields = [
            p.id.to_string(),
            p.session_id.to_string(),
            p.student_id.to_string(),
            p.tutor_id.to_string(),
            p.subject.clone(),
            p.amount.to_string(),
            p.discount.to_string(),
            p.method.clone(),
            p.status.clone(),
            p.created_at.to_rfc3339(),
            p.refunded_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote fields containing separators, quotes or line breaks.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    #[test]
    fn discount_rounds_to_cents() {
        let price = Decimal::from_str("67.50").unwrap();
        assert_eq!(discount_for(price, 10), Decimal::from_str("6.75").unwrap());
        assert_eq!(discount_for(price, 100), price);
        assert_eq!(discount_for(Decimal::from_str("9.99").unwrap(), 15), Decimal::from_str("1.50").unwrap());
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        assert_eq!(csv_field("algebra"), "algebra");
        assert_eq!(csv_field("maths, advanced"), "\"maths, advanced\"");
        assert_eq!(csv_field("the \"hard\" one"), "\"the \"\"hard\"\" one\"");
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let payment = Payment {
            id: Uuid::nil(),
            session_id: Uuid::nil(),
            student_id: Uuid::nil(),
            tutor_id: Uuid::nil(),
            subject: "calc, II".into(),
            amount: Decimal::from_str("40.00").unwrap(),
            discount: Decimal::ZERO,
            coupon_id: None,
            method: "card".into(),
            status: "completed".into(),
            refunded_at: None,
            created_at: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
        };
        let csv = payments_to_csv(&[payment]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(",\"calc, II\",40.00,0,card,completed,2030-01-02T03:04:05+00:00,"));
    }
}
