use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{generate_jwt, validate_jwt, Claims};

/// The identity half of a user, as known to the auth backend.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
}

/// A successful credential exchange: who signed in, and the bearer token
/// issued for the session.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: IdentityUser,
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no active session")]
    NoSession,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already in use")]
    EmailTaken,
    #[error("identity backend error: {0}")]
    Backend(String),
}

/// Remote identity provider interface: credential exchange, session lookup,
/// sign-out, and independent email/password updates.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, IdentityError>;

    /// The user behind the provider's persisted session, if any.
    async fn current_user(&self) -> Result<IdentityUser, IdentityError>;

    /// Resolve a bearer token presented on a request.
    async fn authenticate_token(&self, token: &str) -> Result<IdentityUser, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn update_email(&self, user_id: Uuid, new_email: &str) -> Result<(), IdentityError>;

    async fn update_password(&self, user_id: Uuid, new_password: &str)
        -> Result<(), IdentityError>;
}

/// Postgres-backed identity provider: credentials live on the users table as
/// sha256 digests, sessions are JWTs registered in the sessions table so that
/// sign-out can revoke them.
pub struct PgIdentityProvider {
    pool: PgPool,
    session_token: RwLock<Option<String>>,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, session_token: RwLock::new(None) }
    }

    fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, IdentityError> {
        let row: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT id, email FROM users WHERE email = $1 AND password_hash = $2",
        )
        .bind(email)
        .bind(Self::hash_password(password))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Backend(e.to_string()))?;

        let (id, email) = row.ok_or(IdentityError::InvalidCredentials)?;

        let claims = Claims::new(id, email.clone());
        let token =
            generate_jwt(&claims).map_err(|e| IdentityError::Backend(e.to_string()))?;

        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES ($1, $2, NOW())")
            .bind(&token)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        *self.session_token.write().await = Some(token.clone());

        Ok(SignIn { user: IdentityUser { id, email }, token })
    }

    async fn current_user(&self) -> Result<IdentityUser, IdentityError> {
        let token = self.session_token.read().await.clone().ok_or(IdentityError::NoSession)?;
        self.authenticate_token(&token).await
    }

    async fn authenticate_token(&self, token: &str) -> Result<IdentityUser, IdentityError> {
        let claims = validate_jwt(token).map_err(|_| IdentityError::NoSession)?;

        // Revoked tokens disappear from the sessions table on sign-out
        let known: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IdentityError::Backend(e.to_string()))?;

        match known {
            Some((user_id,)) if user_id == claims.sub => {
                Ok(IdentityUser { id: claims.sub, email: claims.email })
            }
            _ => Err(IdentityError::NoSession),
        }
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let token = self.session_token.write().await.take();

        if let Some(token) = token {
            sqlx::query("DELETE FROM sessions WHERE token = $1")
                .bind(&token)
                .execute(&self.pool)
                .await
                .map_err(|e| IdentityError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn update_email(&self, user_id: Uuid, new_email: &str) -> Result<(), IdentityError> {
        let taken: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id <> $2")
                .bind(new_email)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IdentityError::Backend(e.to_string()))?;

        if taken.is_some() {
            return Err(IdentityError::EmailTaken);
        }

        sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
            .bind(new_email)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(Self::hash_password(new_password))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;
        Ok(())
    }
}
