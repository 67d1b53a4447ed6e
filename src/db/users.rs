//! Credential store: the only server-side mutable state in the system.
//!
//! Accounts are created unverified with a pending verification code,
//! flipped to verified exactly once, and never deleted.

use sqlx::SqlitePool;
use thiserror::Error;

use super::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An account with this email already exists")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an unverified user with a pending verification code.
    ///
    /// Duplicate detection is an existence query followed by an insert,
    /// not a single atomic statement; two concurrent registrations for
    /// the same email can both pass the check.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        verification_code: &str,
    ) -> Result<User, StoreError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, verification_code, is_verified) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(verification_code)
        .execute(&self.pool)
        .await?;

        let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Flip the account to verified and consume its code.
    pub async fn mark_verified(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET is_verified = 1, verification_code = NULL, \
             updated_at = datetime('now') WHERE email = ?",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_pool;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = UserStore::new(init_test_pool().await);

        let user = store
            .create_user("Anna", "a@b.com", "hash", "123456")
            .await
            .unwrap();
        assert_eq!(user.email, "a@b.com");
        assert!(!user.is_verified);
        assert_eq!(user.verification_code.as_deref(), Some("123456"));

        let found = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(store.find_by_email("nobody@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = UserStore::new(init_test_pool().await);

        store
            .create_user("Anna", "a@b.com", "hash", "123456")
            .await
            .unwrap();
        let err = store
            .create_user("Other", "a@b.com", "hash2", "654321")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_mark_verified_consumes_code() {
        let store = UserStore::new(init_test_pool().await);

        store
            .create_user("Anna", "a@b.com", "hash", "123456")
            .await
            .unwrap();
        store.mark_verified("a@b.com").await.unwrap();

        let user = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert!(user.is_verified);
        assert!(user.verification_code.is_none());
    }
}
