use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    db::{
        helpers::{format_datetime, parse_datetime, to_u32},
        Database,
    },
    models::{NewSession, SessionRecord},
    store::{SessionStore, StoreEvent},
};

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let duration_minutes: i64 = row.get("duration_minutes")?;
    let distractions: i64 = row.get("distractions")?;
    let completed_at: String = row.get("completed_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        duration_minutes: to_u32(duration_minutes, "duration_minutes")?,
        distractions: to_u32(distractions, "distractions")?,
        completed_at: parse_datetime(&completed_at, "completed_at")?,
    })
}

#[async_trait]
impl SessionStore for Database {
    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord> {
        let record = SessionRecord::from_new(Uuid::new_v4().to_string(), session);
        let row = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, duration_minutes, distractions, completed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.id,
                    row.user_id,
                    row.duration_minutes,
                    row.distractions,
                    format_datetime(&row.completed_at),
                    format_datetime(&Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await?;

        self.notify(StoreEvent::SessionInserted(record.clone()));
        Ok(record)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, duration_minutes, distractions, completed_at
                 FROM sessions
                 WHERE user_id = ?1
                 ORDER BY completed_at DESC, rowid DESC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    async fn list_all_durations(&self) -> Result<Vec<u32>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT duration_minutes FROM sessions")?;
            let mut rows = stmt.query([])?;
            let mut durations = Vec::new();
            while let Some(row) = rows.next()? {
                durations.push(to_u32(row.get(0)?, "duration_minutes")?);
            }
            Ok(durations)
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
