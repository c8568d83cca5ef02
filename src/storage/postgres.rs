//! Postgres-backed storage. Plain runtime queries, each wrapped in a
//! `db.query` span; the schema lives in `sql/schema.sql`.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::Storage;
use crate::accounts::models::{Role, Token, TokenPurpose, User};
use crate::accounts::Error;

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error> {
        let query = "SELECT role_id FROM user_roles WHERE user_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        Ok(rows.iter().map(|row| row.get("role_id")).collect())
    }

    async fn hydrate_user(&self, row: &PgRow) -> Result<User, Error> {
        let mut user = user_from_row(row);
        user.roles = self.roles_for_user(user.id).await?;

        Ok(user)
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
        is_verified: row.get("is_verified"),
        roles: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn token_from_row(row: &PgRow) -> Result<Token, Error> {
    let purpose: String = row.get("purpose");
    let purpose = TokenPurpose::parse(&purpose)
        .ok_or_else(|| Error::Internal(anyhow::anyhow!("unknown token purpose: {purpose}")))?;

    Ok(Token {
        id: row.get("id"),
        user_id: row.get("user_id"),
        purpose,
        expires: row.get("expires"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .as_deref()
        == Some("23505")
}

const SELECT_USER: &str = "SELECT id, email, password_hash, is_active, is_staff, is_superuser, \
                           is_verified, created_at, updated_at FROM users";

#[async_trait]
impl Storage for PgStorage {
    async fn healthy(&self) -> Result<(), Error> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        let mut conn = self.pool.acquire().await?;
        conn.ping().instrument(span).await?;

        Ok(())
    }

    async fn create_user(&self, user: User) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let query = "INSERT INTO users \
                     (id, email, password_hash, is_active, is_staff, is_superuser, is_verified, \
                      created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .bind(user.is_verified)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&mut *tx)
            .instrument(span)
            .await;

        if let Err(err) = result {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Err(Error::Validation(
                    "a user already exists with that email address".to_string(),
                ));
            }
            return Err(err.into());
        }

        for role_id in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, Error> {
        let query = format!("{SELECT_USER} WHERE id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(&row).await?)),
            None => Ok(None),
        }
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let query = format!("{SELECT_USER} WHERE email = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_user(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let query = "UPDATE users SET email = $2, password_hash = $3, is_active = $4, \
                     is_staff = $5, is_superuser = $6, is_verified = $7, updated_at = $8 \
                     WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .bind(user.is_verified)
            .bind(user.updated_at)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(Error::NotFound("user"));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        for role_id in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, Error> {
        let owned: bool =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM tokens WHERE user_id = $1) AS owned")
                .bind(id)
                .fetch_one(&self.pool)
                .await?
                .get("owned");

        if owned {
            return Err(Error::Protected("user"));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let query = "DELETE FROM users WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_role(&self, role: Role) -> Result<(), Error> {
        let query = "INSERT INTO roles (id, name) VALUES ($1, $2)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(role.id)
            .bind(&role.name)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Option<Role>, Error> {
        let query = "SELECT id, name FROM roles WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| Role {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool, Error> {
        let referenced: bool =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM user_roles WHERE role_id = $1) AS referenced")
                .bind(id)
                .fetch_one(&self.pool)
                .await?
                .get("referenced");

        if referenced {
            return Err(Error::Protected("role"));
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_token(&self, token: Token) -> Result<(), Error> {
        let query = "INSERT INTO tokens (id, user_id, purpose, expires) VALUES ($1, $2, $3, $4)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token.id)
            .bind(token.user_id)
            .bind(token.purpose.as_str())
            .bind(token.expires)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    async fn token_by_id(&self, id: Uuid) -> Result<Option<Token>, Error> {
        let query = "SELECT id, user_id, purpose, expires FROM tokens WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.map(|row| token_from_row(&row)).transpose()
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), Error> {
        let query = "DELETE FROM tokens WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }

    async fn delete_tokens_for_user(&self, user_id: Uuid) -> Result<u64, Error> {
        let query = "DELETE FROM tokens WHERE user_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(result.rows_affected())
    }

    async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Token>, Error> {
        let query = "SELECT id, user_id, purpose, expires FROM tokens WHERE user_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter().map(token_from_row).collect()
    }
}
