use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::{NewSession, SessionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionInserted(SessionRecord),
}

/// Durable home of completed sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord>;

    /// Sessions owned by `user_id`, most recent first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>>;

    /// Durations of every session from every user.
    async fn list_all_durations(&self) -> Result<Vec<u32>>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
