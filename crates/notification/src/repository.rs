use std::sync::Arc;

use async_trait::async_trait;
use common::{Role, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::Notification;

/// Durable storage for notifications, insertion-ordered.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn save(&self, notification: Notification);

    /// All notifications visible to the given identity, oldest first.
    async fn for_user(&self, user_id: UserId, role: Role) -> Vec<Notification>;

    async fn unread_for_user(&self, user_id: UserId, role: Role) -> Vec<Notification>;

    /// Marks one notification read. Returns false if the id is unknown.
    async fn mark_read(&self, id: Uuid) -> bool;

    /// Marks everything visible to the identity as read, returning how many
    /// flipped.
    async fn mark_all_read(&self, user_id: UserId, role: Role) -> usize;
}

/// In-memory notification store.
#[derive(Clone, Default)]
pub struct InMemoryNotificationRepository {
    entries: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Everything in the store, oldest first. Test helper.
    pub async fn all(&self) -> Vec<Notification> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn save(&self, notification: Notification) {
        self.entries.write().await.push(notification);
    }

    async fn for_user(&self, user_id: UserId, role: Role) -> Vec<Notification> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|n| n.audience.includes(user_id, role))
            .cloned()
            .collect()
    }

    async fn unread_for_user(&self, user_id: UserId, role: Role) -> Vec<Notification> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|n| !n.read && n.audience.includes(user_id, role))
            .cloned()
            .collect()
    }

    async fn mark_read(&self, id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    async fn mark_all_read(&self, user_id: UserId, role: Role) -> usize {
        let mut entries = self.entries.write().await;
        let mut flipped = 0;
        for n in entries.iter_mut() {
            if !n.read && n.audience.includes(user_id, role) {
                n.read = true;
                flipped += 1;
            }
        }
        flipped
    }
}
