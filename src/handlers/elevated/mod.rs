// handlers/elevated/mod.rs - admin-only routes under /api/admin
//
// `require_admin_middleware` runs after JWT validation, so every handler here
// receives an admin `AuthUser`.

pub mod analytics;
pub mod coupons;
pub mod disputes;
pub mod documents;
pub mod payments;
pub mod tutors;
pub mod users;

pub use analytics::{activity as activity_list, overview as analytics_overview};
pub use coupons::{create as coupon_create, deactivate as coupon_deactivate, list as coupon_list};
pub use disputes::resolve as dispute_resolve;
pub use documents::{reject as document_reject, verify as document_verify};
pub use payments::{export as payment_export, refund as payment_refund};
pub use tutors::{approve as tutor_approve, list as tutor_list, reject as tutor_reject};
pub use users::{activate as user_activate, list as user_list, suspend as user_suspend};
