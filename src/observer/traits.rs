use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use crate::observer::effects::SideEffect;
use crate::observer::error::ObserverError;

/// Post-commit rings. Lower rings run first for the same effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ObserverRing {
    Audit = 7,        // Activity log rows
    Notification = 9, // Per-user notification rows
}

/// A best-effort hook that runs after the mutation's transaction has committed.
#[async_trait]
pub trait PostCommitObserver: Send + Sync {
    /// Observer name for logging
    fn name(&self) -> &'static str;

    fn ring(&self) -> ObserverRing;

    fn applies_to(&self, effect: &SideEffect) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn execute(&self, pool: &PgPool, effect: &SideEffect) -> Result<(), ObserverError>;
}
