use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for user accounts and their reset tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Store a reset token for the user, replacing any previous one.
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at_ms: i64,
    ) -> Result<(), StoreError>;

    /// Find the user holding `token` if it expires strictly after `now_ms`.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now_ms: i64,
    ) -> Result<Option<User>, StoreError>;

    /// Replace the password hash and clear the reset token, but only while
    /// `token` is still the one stored for the user. Returns whether a row
    /// was updated.
    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError>;
}

pub type DynUserStore = Arc<dyn UserStore>;

const USER_COLUMNS: &str = "id, email, password_hash, name, phone, city, role, \
     reset_password_token, reset_password_expires, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, name, phone, city)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.city)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::DuplicateEmail
                }
                other => StoreError::Database(other),
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at_ms: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_password_token = $1, reset_password_expires = $2
            WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at_ms)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now_ms: i64,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_password_token = $1 AND reset_password_expires > $2"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(now_ms)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1,
                reset_password_token = NULL,
                reset_password_expires = NULL
            WHERE id = $2 AND reset_password_token = $3
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
