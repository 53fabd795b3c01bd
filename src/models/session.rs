use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session as it is handed to the store at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub user_id: String,
    pub duration_minutes: u32,
    pub distractions: u32,
    pub completed_at: DateTime<Utc>,
}

/// A persisted, immutable meditation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub duration_minutes: u32,
    pub distractions: u32,
    pub completed_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_new(id: String, session: NewSession) -> Self {
        Self {
            id,
            user_id: session.user_id,
            duration_minutes: session.duration_minutes,
            distractions: session.distractions,
            completed_at: session.completed_at,
        }
    }
}
