//! Opaque, single-use, time-bounded capability tokens.
//!
//! A token binds a user to one purpose (email verification or password
//! reset) and expires a fixed window after minting. Redemption is split into
//! lookup (`redeem`), expiry check (`assert_not_expired`), and terminal
//! deletion (`consume`): the calling flow performs its side effects between
//! the check and the consume. The steps are not wrapped in a transaction, so
//! two concurrent redemptions of the same id can both pass the expiry check
//! before either consumes the token; that window is accepted behavior.
//! Expired tokens stay in storage until a broad delete removes them.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{Token, TokenPurpose};
use super::Error;
use crate::storage::Storage;

pub const DEFAULT_TTL_HOURS: u64 = 24;

pub struct TokenEngine {
    store: Arc<dyn Storage>,
    validity: Duration,
}

impl TokenEngine {
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, ttl_hours: u64) -> Self {
        let hours = i64::try_from(ttl_hours).unwrap_or(24);

        Self {
            store,
            validity: Duration::hours(hours),
        }
    }

    /// Mint and persist a fresh token for the user. Existing live tokens for
    /// the same user and purpose are left alone; duplicates may coexist.
    pub async fn mint(&self, user_id: Uuid, purpose: TokenPurpose) -> Result<Token, Error> {
        let token = Token {
            id: Uuid::new_v4(),
            user_id,
            purpose,
            expires: Utc::now() + self.validity,
        };

        self.store.insert_token(token.clone()).await?;

        Ok(token)
    }

    /// Look up a token by its id. Does not check expiry and does not delete.
    pub async fn redeem(&self, id: Uuid) -> Result<Token, Error> {
        self.store
            .token_by_id(id)
            .await?
            .ok_or(Error::NotFound("token"))
    }

    /// Fails once the expiry timestamp is in the past. The token record is
    /// left in place; only `consume` or `revoke_all` removes it.
    pub fn assert_not_expired(token: &Token) -> Result<(), Error> {
        if token.expires < Utc::now() {
            return Err(Error::Expired);
        }

        Ok(())
    }

    /// Terminal deletion after a successful redemption. Must run after all
    /// purpose-specific side effects, otherwise the token stays redeemable.
    pub async fn consume(&self, token: Token) -> Result<(), Error> {
        self.store.delete_token(token.id).await
    }

    /// Delete every token owned by the user, regardless of purpose.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, Error> {
        self.store.delete_tokens_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn engine() -> TokenEngine {
        TokenEngine::new(Arc::new(MemoryStorage::new()), DEFAULT_TTL_HOURS)
    }

    #[tokio::test]
    async fn minted_token_is_redeemable_and_not_expired() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        let token = engine.mint(user_id, TokenPurpose::Verify).await.unwrap();

        assert!(token.expires > Utc::now() + Duration::hours(23));
        assert!(token.expires <= Utc::now() + Duration::hours(24));

        let redeemed = engine.redeem(token.id).await.unwrap();
        assert_eq!(redeemed.user_id, user_id);
        assert_eq!(redeemed.purpose, TokenPurpose::Verify);
        assert!(TokenEngine::assert_not_expired(&redeemed).is_ok());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let engine = engine();

        assert!(matches!(
            engine.redeem(Uuid::new_v4()).await,
            Err(Error::NotFound("token"))
        ));
    }

    #[tokio::test]
    async fn past_expiry_is_rejected() {
        let engine = engine();
        let mut token = engine
            .mint(Uuid::new_v4(), TokenPurpose::Reset)
            .await
            .unwrap();
        token.expires = Utc::now() - Duration::days(2);

        assert!(matches!(
            TokenEngine::assert_not_expired(&token),
            Err(Error::Expired)
        ));
    }

    #[tokio::test]
    async fn consume_deletes_the_token() {
        let engine = engine();
        let token = engine
            .mint(Uuid::new_v4(), TokenPurpose::Verify)
            .await
            .unwrap();
        let id = token.id;

        engine.consume(token).await.unwrap();

        assert!(matches!(
            engine.redeem(id).await,
            Err(Error::NotFound("token"))
        ));
    }

    #[tokio::test]
    async fn duplicates_per_purpose_are_allowed() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        let first = engine.mint(user_id, TokenPurpose::Verify).await.unwrap();
        let second = engine.mint(user_id, TokenPurpose::Verify).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(engine.redeem(first.id).await.is_ok());
        assert!(engine.redeem(second.id).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_all_removes_every_purpose() {
        let engine = engine();
        let user_id = Uuid::new_v4();

        let verify = engine.mint(user_id, TokenPurpose::Verify).await.unwrap();
        let reset = engine.mint(user_id, TokenPurpose::Reset).await.unwrap();

        assert_eq!(engine.revoke_all(user_id).await.unwrap(), 2);
        assert!(engine.redeem(verify.id).await.is_err());
        assert!(engine.redeem(reset.id).await.is_err());
    }
}
