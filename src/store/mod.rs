pub mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A registered caller. `key_hash` is the SHA-256 hex of the current API key;
/// the plaintext key is never stored.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub key_hash: String,
    pub is_active: bool,
}

/// Fields needed to create an identity; id and created_at are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub key_hash: String,
}

/// One append-only usage row, written after each successful generation.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub identity_id: Uuid,
    pub endpoint: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub response_time_ms: i64,
}

/// Aggregated usage for one identity over a trailing window of days.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub total_requests: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub daily_usage: Vec<DailyUsage>,
}

/// Per-day bucket inside [`UsageStats`].
#[derive(Debug, Clone, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub requests: i64,
    pub tokens: i64,
    pub cost: f64,
}

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Duplicate(&'static str),
}

/// Persistence seam for identities and usage accounting.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    async fn find_identity_by_key_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Replace the stored key hash, invalidating the previous API key.
    async fn rotate_key_hash(&self, identity_id: Uuid, key_hash: &str) -> Result<(), StoreError>;

    async fn append_usage(&self, record: UsageRecord) -> Result<(), StoreError>;

    async fn usage_stats(&self, identity_id: Uuid, days: i64) -> Result<UsageStats, StoreError>;
}
