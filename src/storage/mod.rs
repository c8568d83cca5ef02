//! Narrow persistence interface for users, roles, and lifecycle tokens.
//!
//! The server runs against `PgStorage`; tests run against `MemoryStorage`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::accounts::models::{Role, Token, User};
use crate::accounts::Error;

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStorage;
pub use self::postgres::PgStorage;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Cheap liveness probe used by `/health`.
    async fn healthy(&self) -> Result<(), Error>;

    /// Persist a new user. Fails with a validation error when the email is
    /// already registered.
    async fn create_user(&self, user: User) -> Result<(), Error>;

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, Error>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Replace the stored record, role set included.
    async fn update_user(&self, user: &User) -> Result<(), Error>;

    /// Returns whether a record was deleted. Rejected while the user still
    /// owns tokens (protect semantics).
    async fn delete_user(&self, id: Uuid) -> Result<bool, Error>;

    async fn create_role(&self, role: Role) -> Result<(), Error>;

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, Error>;

    /// Rejected while any user references the role (protect semantics).
    async fn delete_role(&self, id: Uuid) -> Result<bool, Error>;

    async fn insert_token(&self, token: Token) -> Result<(), Error>;

    async fn token_by_id(&self, id: Uuid) -> Result<Option<Token>, Error>;

    async fn delete_token(&self, id: Uuid) -> Result<(), Error>;

    /// Delete every token owned by the user; returns how many went away.
    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<u64, Error>;

    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Token>, Error>;
}
