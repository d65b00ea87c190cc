//! Persistence interfaces.
//!
//! Handlers only see these traits; [`MemoryStore`] implements all of them.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Account, NewUser, ResetToken, User, UserMetric, UserPatch};

pub use memory::MemoryStore;

/// Errors raised by repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store failed
    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create an account and return its id. Fails with `Conflict` if the email is taken.
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<i64>;

    async fn account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn update_password(&self, account_id: i64, password_hash: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    /// All users ordered by id.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Apply a partial update and return the updated user, or `None` if it does not exist.
    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait MetricRepository: Send + Sync {
    /// Store a metric for `metric.user_id`. Fails with `NotFound` if the user does not exist.
    async fn create_metric(&self, metric: UserMetric) -> StoreResult<UserMetric>;

    /// Metrics of one user ordered by `created_at`, then id.
    async fn metrics_for_user(&self, user_id: i64) -> StoreResult<Vec<UserMetric>>;
}

#[async_trait]
pub trait ResetTokenRepository: Send + Sync {
    async fn create_reset_token(
        &self,
        account_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Find the newest unused, unexpired token matching the account email and
    /// code and mark it used in the same step. A code is returned at most once.
    async fn consume_reset_token(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ResetToken>>;

    /// Drop every reset token issued to an account.
    async fn delete_reset_tokens(&self, account_id: i64) -> StoreResult<()>;
}
