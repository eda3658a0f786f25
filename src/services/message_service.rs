use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Message;
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{list_page, required_text};

const MAX_CONTENT_CHARS: usize = 5000;
const PREVIEW_CHARS: usize = 80;

pub static MESSAGES: ListSpec = ListSpec {
    select: "SELECT m.*",
    from: "FROM messages m",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("withUser", &["m.sender_id", "m.recipient_id"], FilterOp::Eq, FieldKind::Uuid),
        FilterField::new("unread", &["m.read_at"], FilterOp::IsNull, FieldKind::Bool),
    ],
    sorts: &[SortField::new("createdAt", "m.created_at")],
    default_sort: "createdAt",
    tie_breaker: "m.id",
    default_limit: 50,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub content: String,
}

pub struct MessageService<'a> {
    state: &'a AppState,
}

impl<'a> MessageService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn send(&self, caller: &AuthUser, req: SendMessageRequest) -> Result<Message, ApiError> {
        if req.recipient_id == caller.id {
            return Err(ApiError::invalid_field("recipientId", "You cannot message yourself"));
        }
        let content = required_text("content", &req.content, MAX_CONTENT_CHARS)?;

        let recipient_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(req.recipient_id)
            .fetch_one(self.state.db.pool())
            .await?;
        if !recipient_exists {
            return Err(ApiError::not_found("Recipient not found"));
        }

        let message: Message = sqlx::query_as(
            "INSERT INTO messages (id, sender_id, recipient_id, content) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(caller.id)
        .bind(req.recipient_id)
        .bind(&content)
        .fetch_one(self.state.db.pool())
        .await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(message.recipient_id, "message.received", "New message", preview(&content))
                    .about("message", message.id),
            )
            .activity(NewActivity::new(caller.id, "message.send", "message", message.id));
        self.state.dispatch(effects).await;
        Ok(message)
    }

    /// Conversations the caller takes part in. Asking for `unread` narrows to the
    /// caller's inbox, since only recipients read messages.
    pub async fn list(&self, caller: &AuthUser, params: &ListParams) -> Result<Page<Message>, ApiError> {
        let mut filter = Filter::new(&MESSAGES).scope_with(&["m.sender_id", "m.recipient_id"], FilterOp::Eq, caller.id);
        if params.filters.iter().any(|(name, value)| name == "unread" && !value.trim().is_empty()) {
            filter = filter.scope("m.recipient_id", caller.id);
        }
        list_page(self.state, filter, params).await
    }

    pub async fn mark_read(&self, caller: &AuthUser, message_id: Uuid) -> Result<Message, ApiError> {
        let recipient: Option<Uuid> = sqlx::query_scalar("SELECT recipient_id FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(self.state.db.pool())
            .await?;
        match recipient {
            None => return Err(ApiError::not_found("Message not found")),
            Some(id) if id != caller.id => return Err(ApiError::forbidden("Only the recipient can mark a message as read")),
            Some(_) => {}
        }

        // Re-reading keeps the first read time.
        let message: Message = sqlx::query_as("UPDATE messages SET read_at = COALESCE(read_at, now()) WHERE id = $1 RETURNING *")
            .bind(message_id)
            .fetch_one(self.state.db.pool())
            .await?;
        Ok(message)
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::filter::SqlParam;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("hello"), "hello");
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn with_user_matches_either_side() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = Filter::new(&MESSAGES)
            .scope_with(&["m.sender_id", "m.recipient_id"], FilterOp::Eq, me)
            .assign(&ListParams::new().filter("withUser", other.to_string()), &AppConfig::development().filter)
            .unwrap();
        let count = filter.to_count_sql();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM messages m \
             WHERE (m.sender_id = $1 OR m.recipient_id = $2) AND (m.sender_id = $3 OR m.recipient_id = $4)"
        );
        assert_eq!(count.params, vec![SqlParam::Uuid(me), SqlParam::Uuid(me), SqlParam::Uuid(other), SqlParam::Uuid(other)]);
    }
}
