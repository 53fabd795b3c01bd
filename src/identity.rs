use async_trait::async_trait;
use log::info;
use tokio::sync::watch;

use crate::{db::Database, error::IdentityError, models::UserIdentity};

pub const MAX_NAME_CHARS: usize = 64;

/// Who is using the timer right now.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;

    async fn sign_up(&self, name: &str) -> Result<UserIdentity, IdentityError>;

    async fn sign_in(&self, name: &str) -> Result<UserIdentity, IdentityError>;

    fn sign_out(&self);

    /// Fires whenever the signed-in user changes.
    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>>;
}

fn normalize_name(name: &str) -> Result<&str, IdentityError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(IdentityError::NameTooLong {
            max: MAX_NAME_CHARS,
        });
    }
    Ok(trimmed)
}

/// Name-only profiles kept in the local database. There are no credentials;
/// anything stronger belongs to a real identity service.
pub struct LocalIdentity {
    db: Database,
    current: watch::Sender<Option<UserIdentity>>,
}

impl LocalIdentity {
    pub fn new(db: Database) -> Self {
        let (current, _) = watch::channel(None);
        Self { db, current }
    }

    fn set_current(&self, user: Option<UserIdentity>) {
        self.current.send_replace(user);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<UserIdentity> {
        self.current.borrow().clone()
    }

    async fn sign_up(&self, name: &str) -> Result<UserIdentity, IdentityError> {
        let name = normalize_name(name)?;
        if self.db.find_user_by_name(name).await?.is_some() {
            return Err(IdentityError::AlreadyExists(name.to_string()));
        }

        let user = self.db.create_user(name).await?;
        info!("Created profile {} ({})", user.display_name, user.id);
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, name: &str) -> Result<UserIdentity, IdentityError> {
        let name = normalize_name(name)?;
        let user = self
            .db
            .find_user_by_name(name)
            .await?
            .ok_or_else(|| IdentityError::UnknownUser(name.to_string()))?;

        info!("Signed in as {}", user.display_name);
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) {
        if let Some(user) = self.current_user() {
            info!("Signed out {}", user.display_name);
        }
        self.set_current(None);
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> (tempfile::TempDir, LocalIdentity) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("zendo.sqlite3")).unwrap();
        (dir, LocalIdentity::new(db))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in_again() {
        let (_dir, identity) = identity();
        let mut changes = identity.subscribe();
        assert!(identity.current_user().is_none());

        let user = identity.sign_up("  Sam ").await.unwrap();
        assert_eq!(user.display_name, "Sam");
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().clone(), Some(user.clone()));

        identity.sign_out();
        assert!(identity.current_user().is_none());

        let again = identity.sign_in("sam").await.unwrap();
        assert_eq!(again, user);
        assert_eq!(identity.current_user(), Some(user));
    }

    #[tokio::test]
    async fn rejects_bad_names() {
        let (_dir, identity) = identity();

        assert!(matches!(
            identity.sign_up("   ").await,
            Err(IdentityError::EmptyName)
        ));
        assert!(matches!(
            identity.sign_up(&"x".repeat(MAX_NAME_CHARS + 1)).await,
            Err(IdentityError::NameTooLong { .. })
        ));
        assert!(matches!(
            identity.sign_in("Nobody").await,
            Err(IdentityError::UnknownUser(_))
        ));
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn duplicate_sign_up_fails() {
        let (_dir, identity) = identity();
        identity.sign_up("Lee").await.unwrap();
        identity.sign_out();

        assert!(matches!(
            identity.sign_up("LEE").await,
            Err(IdentityError::AlreadyExists(_))
        ));
        assert!(identity.current_user().is_none());
    }
}
