//! In-process [`UserStore`] used by unit and router tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};

/// Mirrors the column default in the users migration.
const DEFAULT_ROLE: &str = "user";

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a user's role, e.g. to seed an admin.
    pub fn set_role(&self, email: &str, role: &str) {
        let mut users = self.users.lock().unwrap();
        if let Some(u) = users.iter_mut().find(|u| u.email == email) {
            u.role = role.to_string();
        }
    }

    pub fn get(&self, email: &str) -> Option<User> {
        let users = self.users.lock().unwrap();
        users.iter().find(|u| u.email == email).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            phone: user.phone,
            city: user.city,
            role: DEFAULT_ROLE.to_string(),
            reset_password_token: None,
            reset_password_expires: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.get(email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at_ms: i64,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        if let Some(u) = users.iter_mut().find(|u| u.id == user_id) {
            u.reset_password_token = Some(token.to_string());
            u.reset_password_expires = Some(expires_at_ms);
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now_ms: i64,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| {
                u.reset_password_token.as_deref() == Some(token)
                    && u.reset_password_expires.is_some_and(|exp| exp > now_ms)
            })
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|u| u.id == user_id && u.reset_password_token.as_deref() == Some(token))
        {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                u.reset_password_token = None;
                u.reset_password_expires = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
