//! Best-effort push to live sessions.
//!
//! The durable record is the repository; push only reaches whoever is
//! connected right now. The real platform fronts this with a WebSocket
//! layer; here a session is an in-process channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Role, UserId};
use tokio::sync::{mpsc, RwLock};

use crate::error::NotificationError;
use crate::model::Notification;
use crate::Result;

/// Delivery to live sessions. Implementations must not block on slow or
/// absent receivers.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Pushes to every connected session the notification's audience
    /// covers. Zero matching sessions is success, not failure.
    async fn push(&self, notification: &Notification) -> Result<()>;
}

struct Session {
    user_id: UserId,
    role: Role,
    sender: mpsc::UnboundedSender<Notification>,
}

/// In-process session registry doubling as the push gateway.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<Vec<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for an identity. The returned receiver sees every
    /// pushed notification whose audience covers the identity, until
    /// dropped.
    pub async fn connect(
        &self,
        user_id: UserId,
        role: Role,
    ) -> mpsc::UnboundedReceiver<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.sessions.write().await.push(Session {
            user_id,
            role,
            sender,
        });
        receiver
    }

    pub async fn connected_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl PushGateway for SessionRegistry {
    async fn push(&self, notification: &Notification) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        // Dropped receivers are pruned as they are discovered.
        sessions.retain(|s| !s.sender.is_closed());

        let mut delivered = 0usize;
        for session in sessions.iter() {
            if notification.audience.includes(session.user_id, session.role)
                && session.sender.send(notification.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        metrics::counter!("notifications_pushed_total").increment(delivered as u64);
        Ok(())
    }
}

/// Push gateway that always fails. Test double for the persistence-first
/// guarantee.
pub struct FailingPushGateway;

#[async_trait]
impl PushGateway for FailingPushGateway {
    async fn push(&self, _notification: &Notification) -> Result<()> {
        Err(NotificationError::Push("session transport down".to_string()))
    }
}
