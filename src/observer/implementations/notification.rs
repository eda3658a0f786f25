use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::observer::effects::SideEffect;
use crate::observer::error::ObserverError;
use crate::observer::traits::{ObserverRing, PostCommitObserver};

/// Writes one `notifications` row per notify effect.
pub struct NotificationWriter;

#[async_trait]
impl PostCommitObserver for NotificationWriter {
    fn name(&self) -> &'static str {
        "NotificationWriter"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Notification
    }

    fn applies_to(&self, effect: &SideEffect) -> bool {
        matches!(effect, SideEffect::Notify(_))
    }

    async fn execute(&self, pool: &PgPool, effect: &SideEffect) -> Result<(), ObserverError> {
        let SideEffect::Notify(n) = effect else {
            return Ok(());
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, body, entity_type, entity_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(n.user_id)
        .bind(n.kind)
        .bind(&n.title)
        .bind(&n.body)
        .bind(n.entity_type)
        .bind(n.entity_id)
        .execute(pool)
        .await?;

        tracing::debug!("Notification '{}' written for user {}", n.kind, n.user_id);
        Ok(())
    }
}
