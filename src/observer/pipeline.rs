use std::time::Instant;

use sqlx::PgPool;
use tokio::time::timeout;

use crate::observer::effects::{Effects, SideEffect};
use crate::observer::error::ObserverError;
use crate::observer::implementations::{ActivityLogWriter, NotificationWriter};
use crate::observer::traits::PostCommitObserver;

/// Outcome of one dispatch; failures are logged and counted, never returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub executed: usize,
    pub failed: usize,
}

/// Ordered list of post-commit hooks. Each (effect, observer) pair is isolated:
/// a failure or timeout is logged and the remaining hooks still run.
pub struct ObserverPipeline {
    observers: Vec<Box<dyn PostCommitObserver>>,
}

impl ObserverPipeline {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    /// Pipeline with the notification and activity-log writers registered.
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(ActivityLogWriter));
        pipeline.register(Box::new(NotificationWriter));
        pipeline
    }

    pub fn register(&mut self, observer: Box<dyn PostCommitObserver>) {
        tracing::debug!("Registered observer '{}' for ring {:?}", observer.name(), observer.ring());
        self.observers.push(observer);
        self.observers.sort_by_key(|o| o.ring());
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run every applicable observer for every effect, in ring order.
    pub async fn dispatch(&self, pool: &PgPool, effects: Effects) -> DispatchReport {
        let mut report = DispatchReport::default();
        if effects.is_empty() {
            return report;
        }

        let started = Instant::now();
        for effect in effects.iter() {
            for observer in self.observers.iter().filter(|o| o.applies_to(effect)) {
                report.executed += 1;
                if let Err(e) = self.run_one(observer.as_ref(), pool, effect).await {
                    report.failed += 1;
                    tracing::warn!(observer = observer.name(), effect = effect.kind(), "post-commit observer failed: {}", e);
                }
            }
        }

        tracing::debug!(
            executed = report.executed,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "post-commit observers finished"
        );
        report
    }

    async fn run_one(&self, observer: &dyn PostCommitObserver, pool: &PgPool, effect: &SideEffect) -> Result<(), ObserverError> {
        let limit = observer.timeout();
        match timeout(limit, observer.execute(pool, effect)).await {
            Ok(result) => result,
            Err(_) => Err(ObserverError::Timeout(limit)),
        }
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}
