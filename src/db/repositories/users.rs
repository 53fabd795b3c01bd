use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::{
    db::{helpers::format_datetime, Database},
    models::UserIdentity,
};

impl Database {
    pub async fn create_user(&self, display_name: &str) -> Result<UserIdentity> {
        let user = UserIdentity {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
        };
        let row = user.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)",
                params![row.id, row.display_name, format_datetime(&Utc::now())],
            )?;
            Ok(())
        })
        .await?;
        Ok(user)
    }

    /// Case-insensitive lookup by display name.
    pub async fn find_user_by_name(&self, display_name: &str) -> Result<Option<UserIdentity>> {
        let display_name = display_name.to_string();
        self.execute(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, display_name FROM users WHERE display_name = ?1",
                    params![display_name],
                    |row| {
                        Ok(UserIdentity {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }
}
