pub mod user;
pub mod tutor;
pub mod session;
pub mod exam;
pub mod message;
pub mod planner;
pub mod coupon;
pub mod activity;

pub use activity::{ActivityEntry, Notification};
pub use coupon::Coupon;
pub use exam::{Exam, ExamSubmission};
pub use message::Message;
pub use planner::PlannerItem;
pub use session::{Dispute, Payment, Session};
pub use tutor::{Document, TutorProfile};
pub use user::User;
