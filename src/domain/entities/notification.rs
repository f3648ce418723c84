use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ProvisioningComplete,
    ProvisioningPartial,
    ProvisioningCancelled,
    Info,
}

/// Ephemeral message delivered through the in-memory hub; never persisted
/// by this service once consumed.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    /// Target user; `None` together with `global` means broadcast.
    pub user_id: Option<Uuid>,
    pub global: bool,
}

impl Notification {
    pub fn to_user(user_id: Uuid, kind: NotificationKind, title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            kind,
            user_id: Some(user_id),
            global: false,
        }
    }

    pub fn broadcast(kind: NotificationKind, title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            kind,
            user_id: None,
            global: true,
        }
    }
}
