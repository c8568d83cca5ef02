//! Account lifecycle, authentication, and directory services.
//!
//! `Lifecycle` drives the token-gated state machine (registration, email
//! confirmation, password reset), `Auth` turns credentials into session
//! credentials, and `Directory` covers user CRUD and role assignment.

use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use super::models::{TokenPurpose, User};
use super::password;
use super::session::{SessionClaims, SessionSigner};
use super::tokens::TokenEngine;
use super::Error;
use crate::notify::{Notification, Notifier};
use crate::storage::Storage;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct Lifecycle {
    store: Arc<dyn Storage>,
    tokens: TokenEngine,
    notifier: Notifier,
}

impl Lifecycle {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, tokens: TokenEngine, notifier: Notifier) -> Self {
        Self {
            store,
            tokens,
            notifier,
        }
    }

    /// Create an unverified, active user and queue a verification message
    /// carrying a fresh VERIFY token.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, Error> {
        let email = normalize_email(email);

        if !valid_email(&email) {
            return Err(Error::Validation("invalid email address".to_string()));
        }

        if password.is_empty() {
            return Err(Error::Validation("password is required".to_string()));
        }

        let user = User::new(email, password::hash(password)?);
        self.store.create_user(user.clone()).await?;

        let token = self.tokens.mint(user.id, TokenPurpose::Verify).await?;
        self.notifier
            .enqueue(Notification::verify(&user.email, token.id));

        Ok(user)
    }

    /// Consume a VERIFY token and mark its owner verified.
    ///
    /// The user mutation is persisted before the token is deleted; if the
    /// delete fails the user stays verified and the token redeemable. No
    /// rollback is attempted.
    pub async fn confirm_email(&self, token_id: Uuid) -> Result<(), Error> {
        let token = self.tokens.redeem(token_id).await?;
        TokenEngine::assert_not_expired(&token)?;

        let mut user = self
            .store
            .user_by_id(token.user_id)
            .await?
            .ok_or(Error::NotFound("user"))?;

        user.is_verified = true;
        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        self.tokens.consume(token).await
    }

    /// Start the verification flow over: drop every token the user owns,
    /// whatever its purpose, then mint and send a new VERIFY token.
    pub async fn reissue_verification(&self, email: &str) -> Result<(), Error> {
        let email = normalize_email(email);
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(Error::NotFound("user"))?;

        self.tokens.revoke_all(user.id).await?;

        let token = self.tokens.mint(user.id, TokenPurpose::Verify).await?;
        self.notifier
            .enqueue(Notification::verify(&user.email, token.id));

        Ok(())
    }

    /// Mint a RESET token and queue a password-reset message carrying it.
    pub async fn request_password_change(&self, email: &str) -> Result<(), Error> {
        let email = normalize_email(email);
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(Error::NotFound("user"))?;

        let token = self.tokens.mint(user.id, TokenPurpose::Reset).await?;
        self.notifier
            .enqueue(Notification::reset(&user.email, token.id));

        Ok(())
    }

    /// Consume a RESET token and replace its owner's credential hash.
    pub async fn change_password(&self, token_id: Uuid, new_password: &str) -> Result<(), Error> {
        if new_password.is_empty() {
            return Err(Error::Validation("password is required".to_string()));
        }

        let token = self.tokens.redeem(token_id).await?;
        TokenEngine::assert_not_expired(&token)?;

        let mut user = self
            .store
            .user_by_id(token.user_id)
            .await?
            .ok_or(Error::NotFound("user"))?;

        user.password_hash = password::hash(new_password)?;
        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        self.tokens.consume(token).await
    }
}

pub struct Auth {
    store: Arc<dyn Storage>,
    sessions: SessionSigner,
}

impl Auth {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, sessions: SessionSigner) -> Self {
        Self { store, sessions }
    }

    /// Validate credentials and issue a session credential. Unknown email,
    /// wrong password, and inactive accounts all fail the same way so the
    /// response never leaks which part was wrong.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(String, User), Error> {
        let email = normalize_email(email);
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !user.is_active || !password::verify(&user.password_hash, password) {
            return Err(Error::InvalidCredentials);
        }

        let credential = self.sessions.issue(&user)?;

        Ok((credential, user))
    }

    pub fn verify_session(&self, credential: &str) -> Result<SessionClaims, Error> {
        self.sessions.verify(credential)
    }
}

/// Fields a directory update may touch; everything else is immutable
/// through this surface.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

pub struct Directory {
    store: Arc<dyn Storage>,
}

impl Directory {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, Error> {
        self.store
            .user_by_id(id)
            .await?
            .ok_or(Error::NotFound("user"))
    }

    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, Error> {
        let mut user = self.get_user(id).await?;

        if let Some(email) = update.email {
            let email = normalize_email(&email);

            if !valid_email(&email) {
                return Err(Error::Validation("invalid email address".to_string()));
            }

            if email != user.email && self.store.user_by_email(&email).await?.is_some() {
                return Err(Error::Validation(
                    "a user already exists with that email address".to_string(),
                ));
            }

            user.email = email;
        }

        if let Some(password) = update.password {
            if password.is_empty() {
                return Err(Error::Validation("password is required".to_string()));
            }

            user.password_hash = password::hash(&password)?;
        }

        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }

        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        Ok(user)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<(), Error> {
        if self.store.delete_user(id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("user"))
        }
    }

    /// Replace the user's role set. Duplicates collapse; order follows the
    /// request.
    pub async fn set_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<User, Error> {
        let mut user = self.get_user(user_id).await?;
        self.assert_roles_exist(role_ids).await?;

        user.roles = dedup(role_ids);
        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        Ok(user)
    }

    pub async fn add_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<User, Error> {
        let mut user = self.get_user(user_id).await?;
        self.assert_roles_exist(role_ids).await?;

        for role_id in role_ids {
            if !user.roles.contains(role_id) {
                user.roles.push(*role_id);
            }
        }

        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        Ok(user)
    }

    pub async fn remove_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<User, Error> {
        let mut user = self.get_user(user_id).await?;
        self.assert_roles_exist(role_ids).await?;

        user.roles.retain(|id| !role_ids.contains(id));
        user.updated_at = chrono::Utc::now();
        self.store.update_user(&user).await?;

        Ok(user)
    }

    async fn assert_roles_exist(&self, role_ids: &[Uuid]) -> Result<(), Error> {
        for role_id in role_ids {
            if self.store.role_by_id(*role_id).await?.is_none() {
                return Err(Error::UnknownReference(*role_id));
            }
        }

        Ok(())
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());

    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::models::{Role, Token};
    use crate::accounts::tokens::DEFAULT_TTL_HOURS;
    use crate::notify::{self, LogSender, NotificationKind, NotificationSender, WorkerConfig};
    use crate::storage::MemoryStorage;
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<Notification>>,
    }

    impl NotificationSender for RecordingSender {
        fn send(&self, message: &Notification) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn lifecycle(store: Arc<MemoryStorage>) -> Lifecycle {
        let (notifier, _handle) = notify::spawn(Arc::new(LogSender), WorkerConfig::new());
        let tokens = TokenEngine::new(store.clone(), DEFAULT_TTL_HOURS);
        Lifecycle::new(store, tokens, notifier)
    }

    fn auth(store: Arc<MemoryStorage>) -> Auth {
        let signer = SessionSigner::new(&SecretString::from("sssh".to_string()), 60);
        Auth::new(store, signer)
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let auth = auth(store.clone());

        let user = lifecycle.register("Dave@X.com ", "pw1").await.unwrap();
        assert_eq!(user.email, "dave@x.com");
        assert!(!user.is_verified);

        let (credential, authed) = auth.authenticate("dave@x.com", "pw1").await.unwrap();
        assert_eq!(authed.id, user.id);

        let claims = auth.verify_session(&credential).unwrap();
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store);

        assert!(matches!(
            lifecycle.register("not-an-email", "pw1").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            lifecycle.register("dave@x.com", "").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store);

        lifecycle.register("dave@x.com", "pw1").await.unwrap();

        assert!(matches!(
            lifecycle.register("dave@x.com", "pw2").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn authenticate_fails_uniformly() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let auth = auth(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();

        assert!(matches!(
            auth.authenticate("dave@x.com", "wrong").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("nobody@x.com", "pw1").await,
            Err(Error::InvalidCredentials)
        ));

        let mut inactive = user;
        inactive.is_active = false;
        store.update_user(&inactive).await.unwrap();

        assert!(matches!(
            auth.authenticate("dave@x.com", "pw1").await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn registration_queues_verification_with_token_id() {
        let store = Arc::new(MemoryStorage::new());
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });
        let (notifier, handle) = notify::spawn(sender.clone(), WorkerConfig::new());
        let tokens = TokenEngine::new(store.clone(), DEFAULT_TTL_HOURS);
        let lifecycle = Lifecycle::new(store.clone(), tokens, notifier);

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();

        drop(lifecycle);
        handle.await.unwrap();

        let queued = {
            let sent = sender.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            sent[0].clone()
        };
        assert_eq!(queued.kind, NotificationKind::Verify);
        assert_eq!(queued.recipient, "dave@x.com");

        let token = store.token_by_id(queued.token).await.unwrap().unwrap();
        assert_eq!(token.user_id, user.id);
        assert_eq!(token.purpose, TokenPurpose::Verify);
    }

    #[tokio::test]
    async fn confirm_marks_verified_and_consumes() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        let token = store.tokens_for_user(user.id).await.unwrap().remove(0);

        lifecycle.confirm_email(token.id).await.unwrap();

        let user = store.user_by_id(user.id).await.unwrap().unwrap();
        assert!(user.is_verified);

        // Consumed: the same id is gone
        assert!(matches!(
            lifecycle.confirm_email(token.id).await,
            Err(Error::NotFound("token"))
        ));
    }

    #[tokio::test]
    async fn confirm_rejects_unknown_and_expired() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());

        assert!(matches!(
            lifecycle.confirm_email(Uuid::new_v4()).await,
            Err(Error::NotFound("token"))
        ));

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        let stale = Token {
            id: Uuid::new_v4(),
            user_id: user.id,
            purpose: TokenPurpose::Verify,
            expires: Utc::now() - Duration::days(2),
        };
        store.insert_token(stale.clone()).await.unwrap();

        assert!(matches!(
            lifecycle.confirm_email(stale.id).await,
            Err(Error::Expired)
        ));

        // Expired tokens are left in storage
        assert!(store.token_by_id(stale.id).await.unwrap().is_some());
        assert!(!store.user_by_id(user.id).await.unwrap().unwrap().is_verified);
    }

    #[tokio::test]
    async fn reissue_drops_every_token_first() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        lifecycle.request_password_change("dave@x.com").await.unwrap();
        assert_eq!(store.tokens_for_user(user.id).await.unwrap().len(), 2);

        lifecycle.reissue_verification("dave@x.com").await.unwrap();

        let tokens = store.tokens_for_user(user.id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].purpose, TokenPurpose::Verify);

        assert!(matches!(
            lifecycle.reissue_verification("nobody@x.com").await,
            Err(Error::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn change_password_consumes_token() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let auth = auth(store.clone());

        lifecycle.register("dave@x.com", "pw1").await.unwrap();
        lifecycle.request_password_change("dave@x.com").await.unwrap();

        let user = store.user_by_email("dave@x.com").await.unwrap().unwrap();
        let token = store
            .tokens_for_user(user.id)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.purpose == TokenPurpose::Reset)
            .unwrap();

        lifecycle.change_password(token.id, "pw2").await.unwrap();

        assert!(auth.authenticate("dave@x.com", "pw2").await.is_ok());
        assert!(auth.authenticate("dave@x.com", "pw1").await.is_err());

        assert!(matches!(
            lifecycle.change_password(token.id, "pw3").await,
            Err(Error::NotFound("token"))
        ));
    }

    #[tokio::test]
    async fn expired_reset_leaves_hash_unchanged() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let auth = auth(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        let stale = Token {
            id: Uuid::new_v4(),
            user_id: user.id,
            purpose: TokenPurpose::Reset,
            expires: Utc::now() - Duration::days(2),
        };
        store.insert_token(stale.clone()).await.unwrap();

        assert!(matches!(
            lifecycle.change_password(stale.id, "pw2").await,
            Err(Error::Expired)
        ));

        assert!(auth.authenticate("dave@x.com", "pw1").await.is_ok());
        assert!(auth.authenticate("dave@x.com", "pw2").await.is_err());
    }

    #[tokio::test]
    async fn role_assignment_semantics() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let directory = Directory::new(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        let manager = Role::new("manager".to_string());
        let agent = Role::new("agent".to_string());
        store.create_role(manager.clone()).await.unwrap();
        store.create_role(agent.clone()).await.unwrap();

        // Unknown user -> not found; unknown role -> unknown reference
        assert!(matches!(
            directory.set_roles(Uuid::new_v4(), &[manager.id]).await,
            Err(Error::NotFound("user"))
        ));
        let bogus = Uuid::new_v4();
        assert!(matches!(
            directory.set_roles(user.id, &[bogus]).await,
            Err(Error::UnknownReference(id)) if id == bogus
        ));

        let user = directory
            .add_roles(user.id, &[manager.id, manager.id])
            .await
            .unwrap();
        assert_eq!(user.roles, vec![manager.id]);

        let user = directory.set_roles(user.id, &[agent.id]).await.unwrap();
        assert_eq!(user.roles, vec![agent.id]);

        let user = directory.remove_roles(user.id, &[agent.id]).await.unwrap();
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn directory_update_and_delete() {
        let store = Arc::new(MemoryStorage::new());
        let lifecycle = lifecycle(store.clone());
        let directory = Directory::new(store.clone());

        let user = lifecycle.register("dave@x.com", "pw1").await.unwrap();
        lifecycle.register("taken@x.com", "pw1").await.unwrap();

        assert!(matches!(
            directory
                .update_user(
                    user.id,
                    UserUpdate {
                        email: Some("taken@x.com".to_string()),
                        ..UserUpdate::default()
                    }
                )
                .await,
            Err(Error::Validation(_))
        ));

        let updated = directory
            .update_user(
                user.id,
                UserUpdate {
                    email: Some("Dave@New.com".to_string()),
                    is_active: Some(false),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "dave@new.com");
        assert!(!updated.is_active);

        // Live tokens protect the user from deletion
        assert!(matches!(
            directory.delete_user(user.id).await,
            Err(Error::Protected("user"))
        ));

        store.delete_tokens_for_user(user.id).await.unwrap();
        directory.delete_user(user.id).await.unwrap();

        assert!(matches!(
            directory.delete_user(user.id).await,
            Err(Error::NotFound("user"))
        ));
    }
}
