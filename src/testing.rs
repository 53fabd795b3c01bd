//! In-memory stand-ins for the external collaborators.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::{
    error::IdentityError,
    identity::IdentityProvider,
    models::{NewSession, SessionRecord, UserIdentity},
    store::{SessionStore, StoreEvent},
};

pub struct MemoryStore {
    sessions: Mutex<Vec<SessionRecord>>,
    fail_inserts: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sessions: Mutex::new(Vec::new()),
            fail_inserts: AtomicBool::new(false),
            events,
        }
    }
}

impl MemoryStore {
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        let mut sessions = self.sessions.lock().unwrap();
        let record = SessionRecord::from_new(format!("s{}", sessions.len() + 1), session);
        sessions.push(record.clone());
        let _ = self.events.send(StoreEvent::SessionInserted(record.clone()));
        Ok(record)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all_durations(&self) -> Result<Vec<u32>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.iter().map(|s| s.duration_minutes).collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Identity that is whatever the test sets it to.
pub struct StaticIdentity {
    current: watch::Sender<Option<UserIdentity>>,
}

impl StaticIdentity {
    pub fn signed_in(name: &str) -> Self {
        let (current, _) = watch::channel(Some(UserIdentity {
            id: format!("id-{name}"),
            display_name: name.to_string(),
        }));
        Self { current }
    }

    pub fn anonymous() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserIdentity> {
        self.current.borrow().clone()
    }

    async fn sign_up(&self, name: &str) -> Result<UserIdentity, IdentityError> {
        self.sign_in(name).await
    }

    async fn sign_in(&self, name: &str) -> Result<UserIdentity, IdentityError> {
        let user = UserIdentity {
            id: format!("id-{name}"),
            display_name: name.to_string(),
        };
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) {
        self.current.send_replace(None);
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.current.subscribe()
    }
}
