//! Storage contracts consumed by the services.
//!
//! The services never touch storage directly; they are constructed with
//! implementations of these traits. [`memory`] provides in-process
//! implementations.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::PasswordError;
use crate::models::app::{AppService, NewAppService};
use crate::models::auth::{NewSession, RotateSession, Session, User};

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// User accounts.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Create an active user without a password. Fails with
    /// [`RepoError::Conflict`] when the email is taken.
    async fn create(&self, name: &str, email: &str) -> RepoResult<String>;

    /// Create an active user whose password hash is stored in the same write.
    /// Either the user exists with the password afterwards or nothing was
    /// written. Fails with [`RepoError::Conflict`] when the email is taken.
    async fn create_with_password(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> RepoResult<String>;

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Hash `password` and store it.
    async fn set_password(&self, id: &str, password: &str) -> RepoResult<()>;

    /// Stamp the current time as the user's last successful login.
    async fn update_last_login(&self, id: &str) -> RepoResult<()>;

    async fn is_admin(&self, id: &str) -> RepoResult<bool>;

    async fn promote_admin(&self, id: &str) -> RepoResult<()>;
}

/// Login sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new active session.
    async fn create(&self, session: NewSession) -> RepoResult<Session>;

    /// Replace token id, refresh hash, expiry and client metadata of an
    /// active session, but only if its stored refresh hash still equals
    /// `previous_refresh_token_hash`. Returns whether the row was rotated.
    async fn rotate(
        &self,
        rotation: RotateSession,
        previous_refresh_token_hash: &str,
    ) -> RepoResult<bool>;

    async fn inactivate_all_for_user(&self, user_id: &str) -> RepoResult<()>;

    async fn inactivate_by_token_id(&self, token_id: &str) -> RepoResult<()>;

    async fn find_by_refresh_token_hash(&self, hash: &str) -> RepoResult<Option<Session>>;

    async fn find_by_token_id(&self, token_id: &str) -> RepoResult<Option<Session>>;

    async fn list_active_by_user(&self, user_id: &str) -> RepoResult<Vec<Session>>;
}

/// Registered external applications.
#[async_trait]
pub trait AppRegistryRepository: Send + Sync {
    /// Fails with [`RepoError::Conflict`] when the code is taken.
    async fn create(&self, app: NewAppService) -> RepoResult<String>;

    async fn get_by_code(&self, code: &str) -> RepoResult<Option<AppService>>;

    async fn get_by_id(&self, id: &str) -> RepoResult<Option<AppService>>;

    async fn update_secret(&self, id: &str, secret_ciphertext: &str) -> RepoResult<()>;
}
