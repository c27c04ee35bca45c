//! Identity provider and route gating
//!
//! `LocalIdentity` keeps accounts in the catalog store with salted SHA-256
//! password digests and publishes the signed-in user on a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, GatewayError, CONSTRAINT};
use crate::models::{AccountStatus, AuthUser, Role};
use crate::store::CatalogStore;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Signed-in user, re-read from the store
    async fn current_user(&self) -> Option<AuthUser>;

    /// Follow sign-in and sign-out
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError>;

    /// Sign in, then reject and sign out anyone who is not an admin
    async fn admin_sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let user = self.sign_in(email, password).await?;
        if !user.is_admin() {
            self.sign_out().await;
            return Err(AuthError::AdminRequired);
        }
        Ok(user)
    }

    async fn sign_out(&self);
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct LocalIdentity {
    store: Arc<CatalogStore>,
    current: watch::Sender<Option<AuthUser>>,
}

impl LocalIdentity {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        let (current, _) = watch::channel(None);
        Self { store, current }
    }

    /// Create an account with an explicit role without signing it in
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthUser, AuthError> {
        if self.store.username_exists(username)? {
            return Err(AuthError::UsernameTaken);
        }

        let salt = Uuid::new_v4().simple().to_string();
        let digest = hash_password(password, &salt);
        let profile = self
            .store
            .create_user(username, email, &digest, &salt, role)
            .map_err(insert_error)?;
        Ok(AuthUser::from(&profile))
    }
}

/// A sign-up that lost the race for its username still reads as taken
fn insert_error(err: GatewayError) -> AuthError {
    if err.code == CONSTRAINT && err.message.contains("users.username") {
        AuthError::UsernameTaken
    } else {
        AuthError::Gateway(err)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_user(&self) -> Option<AuthUser> {
        let id = self.current.borrow().as_ref().map(|u| u.id.clone())?;
        match self.store.user_by_id(&id) {
            Ok(profile) => profile.as_ref().map(AuthUser::from),
            Err(e) => {
                warn!("Failed to load profile {}: {}", id, e);
                None
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let creds = self
            .store
            .credentials_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if hash_password(password, &creds.salt) != creds.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        if creds.profile.status == AccountStatus::Banned {
            warn!("Banned user {} attempted sign-in", creds.profile.username);
            return Err(AuthError::Banned);
        }

        let user = AuthUser::from(&creds.profile);
        info!("Signed in {}", user.username);
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let user = self.register(username, email, password, Role::User)?;
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) {
        if let Some(user) = self.current.send_replace(None) {
            info!("Signed out {}", user.username);
        }
    }
}

// ============================================================================
// ROUTE GATING
// ============================================================================

/// What a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any signed-in user
    Member,
    /// The member dashboard; admins belong on their own
    UserDashboard,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectLogin,
    RedirectDashboard,
    RedirectAdminDashboard,
}

impl AccessDecision {
    /// Redirect target, if any
    pub fn location(self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::RedirectLogin => Some("/login"),
            Self::RedirectDashboard => Some("/dashboard"),
            Self::RedirectAdminDashboard => Some("/admin/dashboard"),
        }
    }
}

pub fn authorize(user: Option<&AuthUser>, access: Access) -> AccessDecision {
    let Some(user) = user else {
        return AccessDecision::RedirectLogin;
    };

    match access {
        Access::Admin if !user.is_admin() => AccessDecision::RedirectDashboard,
        Access::UserDashboard if user.is_admin() => AccessDecision::RedirectAdminDashboard,
        _ => AccessDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> LocalIdentity {
        LocalIdentity::new(Arc::new(CatalogStore::in_memory().unwrap()))
    }

    #[test]
    fn test_hash_depends_on_salt() {
        let a = hash_password("hunter2", "salt-a");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_password("hunter2", "salt-a"));
        assert_ne!(a, hash_password("hunter2", "salt-b"));
    }

    #[tokio::test]
    async fn test_sign_up_then_in_and_out() {
        let id = identity();
        let mut rx = id.subscribe();

        let user = id.sign_up("neo", "neo@zion.io", "redpill").await.unwrap();
        assert_eq!(user.role, Role::User);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&user));

        id.sign_out().await;
        assert!(id.current_user().await.is_none());

        let again = id.sign_in("neo@zion.io", "redpill").await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(id.current_user().await, Some(again));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let id = identity();
        id.sign_up("neo", "neo@zion.io", "redpill").await.unwrap();
        id.sign_out().await;

        let err = id.sign_in("neo@zion.io", "bluepill").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let err = id.sign_in("ghost@zion.io", "redpill").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let id = identity();
        id.sign_up("neo", "neo@zion.io", "redpill").await.unwrap();
        let err = id.sign_up("neo", "other@zion.io", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[test]
    fn test_username_constraint_reads_as_taken() {
        let store = CatalogStore::in_memory().unwrap();
        store
            .create_user("neo", "neo@zion.io", "h", "s", Role::User)
            .unwrap();

        let by_username = store
            .create_user("neo", "other@zion.io", "h", "s", Role::User)
            .unwrap_err();
        assert!(matches!(insert_error(by_username), AuthError::UsernameTaken));

        let by_email = store
            .create_user("morpheus", "neo@zion.io", "h", "s", Role::User)
            .unwrap_err();
        assert!(matches!(insert_error(by_email), AuthError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_sign_in() {
        let store = Arc::new(CatalogStore::in_memory().unwrap());
        let id = LocalIdentity::new(store.clone());
        let user = id.register("smith", "smith@matrix.io", "agent", Role::User).unwrap();
        store.set_user_status(&user.id, AccountStatus::Banned).unwrap();

        let err = id.sign_in("smith@matrix.io", "agent").await.unwrap_err();
        assert!(matches!(err, AuthError::Banned));
        assert!(id.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_admin_sign_in() {
        let id = identity();
        id.register("root", "root@vidya.io", "toor", Role::Admin).unwrap();
        id.register("neo", "neo@zion.io", "redpill", Role::User).unwrap();

        let admin = id.admin_sign_in("root@vidya.io", "toor").await.unwrap();
        assert!(admin.is_admin());

        let err = id.admin_sign_in("neo@zion.io", "redpill").await.unwrap_err();
        assert!(matches!(err, AuthError::AdminRequired));
        assert!(id.current_user().await.is_none());
    }

    #[test]
    fn test_route_gating() {
        let user = AuthUser {
            id: "u".to_string(),
            username: "neo".to_string(),
            email: "neo@zion.io".to_string(),
            role: Role::User,
            avatar: None,
        };
        let admin = AuthUser {
            role: Role::Admin,
            ..user.clone()
        };

        assert_eq!(authorize(None, Access::Member), AccessDecision::RedirectLogin);
        assert_eq!(authorize(Some(&user), Access::Member), AccessDecision::Allow);
        assert_eq!(
            authorize(Some(&user), Access::Admin),
            AccessDecision::RedirectDashboard
        );
        assert_eq!(authorize(Some(&admin), Access::Admin), AccessDecision::Allow);
        assert_eq!(
            authorize(Some(&admin), Access::UserDashboard),
            AccessDecision::RedirectAdminDashboard
        );
        assert_eq!(authorize(Some(&user), Access::UserDashboard), AccessDecision::Allow);
        assert_eq!(
            AccessDecision::RedirectAdminDashboard.location(),
            Some("/admin/dashboard")
        );
    }
}
