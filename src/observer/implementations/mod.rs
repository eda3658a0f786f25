mod activity_log;
mod notification;

pub use activity_log::ActivityLogWriter;
pub use notification::NotificationWriter;
