use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::observer::effects::SideEffect;
use crate::observer::error::ObserverError;
use crate::observer::traits::{ObserverRing, PostCommitObserver};

/// Appends to `activity_log`.
pub struct ActivityLogWriter;

#[async_trait]
impl PostCommitObserver for ActivityLogWriter {
    fn name(&self) -> &'static str {
        "ActivityLogWriter"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Audit
    }

    fn applies_to(&self, effect: &SideEffect) -> bool {
        matches!(effect, SideEffect::Activity(_))
    }

    async fn execute(&self, pool: &PgPool, effect: &SideEffect) -> Result<(), ObserverError> {
        let SideEffect::Activity(a) = effect else {
            return Ok(());
        };

        sqlx::query(
            "INSERT INTO activity_log (id, actor_id, action, entity_type, entity_id, details) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(a.actor_id)
        .bind(a.action)
        .bind(a.entity_type)
        .bind(a.entity_id)
        .bind(&a.details)
        .execute(pool)
        .await?;

        Ok(())
    }
}
