//! In-memory storage used by the test suites. Same contract as the Postgres
//! backend, including uniqueness and protect semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Storage;
use crate::accounts::models::{Role, Token, User};
use crate::accounts::Error;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    tokens: HashMap<Uuid, Token>,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn healthy(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn create_user(&self, user: User) -> Result<(), Error> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(Error::Validation(
                "a user already exists with that email address".to_string(),
            ));
        }

        inner.users.insert(user.id, user);

        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), Error> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&user.id) {
            return Err(Error::NotFound("user"));
        }

        inner.users.insert(user.id, user.clone());

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&id) {
            return Ok(false);
        }

        if inner.tokens.values().any(|t| t.user_id == id) {
            return Err(Error::Protected("user"));
        }

        inner.users.remove(&id);

        Ok(true)
    }

    async fn create_role(&self, role: Role) -> Result<(), Error> {
        self.inner.write().await.roles.insert(role.id, role);

        Ok(())
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, Error> {
        Ok(self.inner.read().await.roles.get(&id).cloned())
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;

        if !inner.roles.contains_key(&id) {
            return Ok(false);
        }

        if inner.users.values().any(|u| u.roles.contains(&id)) {
            return Err(Error::Protected("role"));
        }

        inner.roles.remove(&id);

        Ok(true)
    }

    async fn insert_token(&self, token: Token) -> Result<(), Error> {
        self.inner.write().await.tokens.insert(token.id, token);

        Ok(())
    }

    async fn token_by_id(&self, id: Uuid) -> Result<Option<Token>, Error> {
        Ok(self.inner.read().await.tokens.get(&id).cloned())
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), Error> {
        self.inner.write().await.tokens.remove(&id);

        Ok(())
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<u64, Error> {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();

        inner.tokens.retain(|_, t| t.user_id != user_id);

        Ok((before - inner.tokens.len()) as u64)
    }

    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Token>, Error> {
        Ok(self
            .inner
            .read()
            .await
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
