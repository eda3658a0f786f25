// handlers/protected/mod.rs - any authenticated role
//
// The JWT middleware has already inserted `AuthUser`; role and ownership checks
// happen in the services.

pub mod account;
pub mod coupons;
pub mod disputes;
pub mod documents;
pub mod exams;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod planner;
pub mod sessions;
pub mod tutors;

pub use account::{change_password as auth_password, me as auth_me};
pub use coupons::check as coupon_check;
pub use disputes::{create as dispute_create, list as dispute_list};
pub use documents::{create as document_create, list as document_list};
pub use exams::{
    create as exam_create, get as exam_get, grade as submission_grade, list as exam_list, publish as exam_publish,
    submissions as submission_list, submit as submission_create,
};
pub use messages::{list as message_list, read as message_read, send as message_send};
pub use notifications::{list as notification_list, read as notification_read, read_all as notification_read_all};
pub use payments::{create as payment_create, list as payment_list};
pub use planner::{create as planner_create, delete as planner_delete, list as planner_list, update as planner_update};
pub use sessions::{
    book as session_book, cancel as session_cancel, complete as session_complete, get as session_get, list as session_list,
    review as session_review,
};
pub use tutors::{get as tutor_get, list as tutor_list, update_me as tutor_update_me};
