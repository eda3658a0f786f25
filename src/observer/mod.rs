// Post-commit side effects: notification and activity-log writes that run after a
// mutation's transaction commits, with per-hook failure isolation.

pub mod effects;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

pub use effects::{Effects, NewActivity, NewNotification, SideEffect};
pub use error::ObserverError;
pub use pipeline::{DispatchReport, ObserverPipeline};
pub use traits::{ObserverRing, PostCommitObserver};
