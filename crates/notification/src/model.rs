use chrono::{DateTime, Utc};
use common::{Role, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "userId")]
pub enum Audience {
    User(UserId),
    AllSellers,
    AllCustomers,
    AllAdmins,
}

impl Audience {
    /// Whether a reader with the given identity sees this notification.
    pub fn includes(&self, user_id: UserId, role: Role) -> bool {
        match self {
            Audience::User(target) => *target == user_id,
            Audience::AllSellers => role == Role::Seller,
            Audience::AllCustomers => role == Role::Customer,
            Audience::AllAdmins => role == Role::Admin,
        }
    }
}

/// Broad category tag, used by clients to pick an icon and a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Order,
    Payment,
    Stock,
    Error,
    Info,
}

/// A persisted notification. Immutable except for the read flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        audience: Audience,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            body: body.into(),
            audience,
            created_at: Utc::now(),
            read: false,
        }
    }
}
