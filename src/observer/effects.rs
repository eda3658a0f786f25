use serde_json::Value;
use uuid::Uuid;

/// A notification row to write for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: &'static str, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { user_id, kind, title: title.into(), body: body.into(), entity_type: None, entity_id: None }
    }

    pub fn about(mut self, entity_type: &'static str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_id = Some(entity_id);
        self
    }
}

/// An activity-log row, e.g. `session.book` by the booking student.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub details: Value,
}

impl NewActivity {
    pub fn new(actor_id: Uuid, action: &'static str, entity_type: &'static str, entity_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            action,
            entity_type,
            entity_id: Some(entity_id),
            details: Value::Object(Default::default()),
        }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Notify(NewNotification),
    Activity(NewActivity),
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::Notify(_) => "notification",
            SideEffect::Activity(_) => "activity",
        }
    }
}

/// Side effects collected by a mutation and dispatched once it has committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects(Vec<SideEffect>);

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(mut self, notification: NewNotification) -> Self {
        self.0.push(SideEffect::Notify(notification));
        self
    }

    pub fn activity(mut self, activity: NewActivity) -> Self {
        self.0.push(SideEffect::Activity(activity));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SideEffect> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_order() {
        let user = Uuid::new_v4();
        let session = Uuid::new_v4();
        let effects = Effects::new()
            .notify(NewNotification::new(user, "session.booked", "New booking", "A student booked you").about("session", session))
            .activity(NewActivity::new(user, "session.book", "session", session));

        let kinds: Vec<_> = effects.iter().map(SideEffect::kind).collect();
        assert_eq!(kinds, vec!["notification", "activity"]);
        assert_eq!(effects.len(), 2);
    }
}
