use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::UserId;

const CHANNEL_CAPACITY: usize = 16;

/// Commands delivered to a user's live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Every session of this user must terminate (e.g. a held role was
    /// deleted and the user's authorization snapshot is stale).
    Expired,
}

/// Collaborator interface for terminating a user's active sessions.
#[async_trait]
pub trait SessionInvalidator: Send + Sync {
    async fn expire_sessions(&self, user_id: UserId);
}

/// Broadcast hub: the in-process session layer subscribes per user and
/// tears the session down when it observes [`SessionEvent::Expired`].
pub struct SessionHub {
    channels: DashMap<UserId, broadcast::Sender<SessionEvent>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to session commands for a user. Creates the channel if needed.
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<SessionEvent> {
        let sender = self
            .channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Drop a user's channel (e.g. when the user is deleted).
    pub fn remove(&self, user_id: &UserId) {
        self.channels.remove(user_id);
    }
}

#[async_trait]
impl SessionInvalidator for SessionHub {
    /// No-op if the user has no live sessions.
    async fn expire_sessions(&self, user_id: UserId) {
        if let Some(sender) = self.channels.get(&user_id) {
            let _ = sender.send(SessionEvent::Expired);
        }
        metrics::counter!(crate::observability::SESSIONS_EXPIRED_TOTAL).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn subscribe_and_expire() {
        let hub = SessionHub::new();
        let uid = Ulid::new();
        let mut rx = hub.subscribe(uid);

        tokio_test::block_on(hub.expire_sessions(uid));
        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received, SessionEvent::Expired);
    }

    #[test]
    fn expire_without_subscribers_is_noop() {
        let hub = SessionHub::new();
        // No subscriber — must not panic or block
        tokio_test::block_on(hub.expire_sessions(Ulid::new()));
    }

    #[test]
    fn expiry_only_reaches_the_target_user() {
        let hub = SessionHub::new();
        let a = Ulid::new();
        let b = Ulid::new();
        let mut rx_a = hub.subscribe(a);
        let mut rx_b = hub.subscribe(b);

        tokio_test::block_on(hub.expire_sessions(a));
        assert_eq!(tokio_test::block_on(rx_a.recv()).unwrap(), SessionEvent::Expired);
        assert!(rx_b.try_recv().is_err());
    }
}
