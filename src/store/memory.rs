//! In-process store backed by locked tables.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    AccountRepository, MetricRepository, ResetTokenRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::model::{Account, NewUser, ResetToken, User, UserMetric, UserPatch};

/// Sequential id generator, starting at 1.
#[derive(Debug, Default)]
struct Sequence(AtomicI64);

impl Sequence {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Thread-safe in-memory implementation of every repository.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Accounts keyed by normalized email
    accounts: DashMap<String, Account>,
    account_ids: Sequence,
    users: RwLock<BTreeMap<i64, User>>,
    user_ids: Sequence,
    metrics: RwLock<Vec<UserMetric>>,
    metric_ids: Sequence,
    reset_tokens: RwLock<Vec<ResetToken>>,
    reset_token_ids: Sequence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<i64> {
        match self.accounts.entry(email.to_string()) {
            Entry::Occupied(_) => {
                Err(StoreError::Conflict(format!("account {email} already exists")))
            }
            Entry::Vacant(slot) => {
                let id = self.account_ids.next();
                slot.insert(Account {
                    id,
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                });
                debug!(account_id = id, "Created account");
                Ok(id)
            }
        }
    }

    async fn account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.get(email).map(|a| a.value().clone()))
    }

    async fn update_password(&self, account_id: i64, password_hash: &str) -> StoreResult<()> {
        let mut account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;
        account.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        let user = User {
            id: self.user_ids.next(),
            name: user.name,
            surname: user.surname,
            gender: user.gender,
            avatar: user.avatar,
            height: user.height,
            birth_of_date: user.birth_of_date,
            created_at: now,
            updated_at: now,
        };
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().values().cloned().collect())
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut users = self.users.write();
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if patch.apply(user) {
            user.updated_at = Utc::now();
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl MetricRepository for MemoryStore {
    async fn create_metric(&self, mut metric: UserMetric) -> StoreResult<UserMetric> {
        if !self.users.read().contains_key(&metric.user_id) {
            return Err(StoreError::NotFound(format!("user {}", metric.user_id)));
        }
        metric.id = self.metric_ids.next();
        self.metrics.write().push(metric.clone());
        Ok(metric)
    }

    async fn metrics_for_user(&self, user_id: i64) -> StoreResult<Vec<UserMetric>> {
        let mut metrics: Vec<UserMetric> = self
            .metrics
            .read()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        metrics.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(metrics)
    }
}

#[async_trait]
impl ResetTokenRepository for MemoryStore {
    async fn create_reset_token(
        &self,
        account_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let record = ResetToken {
            id: self.reset_token_ids.next(),
            account_id,
            token: token.to_string(),
            expires_at,
            used: false,
        };
        self.reset_tokens.write().push(record);
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ResetToken>> {
        let Some(account_id) = self.accounts.get(email).map(|a| a.id) else {
            return Ok(None);
        };

        let mut tokens = self.reset_tokens.write();
        let Some(record) = tokens
            .iter_mut()
            .filter(|t| {
                t.account_id == account_id && t.token == token && !t.used && t.expires_at > now
            })
            .max_by_key(|t| t.id)
        else {
            return Ok(None);
        };

        record.used = true;
        Ok(Some(record.clone()))
    }

    async fn delete_reset_tokens(&self, account_id: i64) -> StoreResult<()> {
        self.reset_tokens.write().retain(|t| t.account_id != account_id);
        Ok(())
    }
}
