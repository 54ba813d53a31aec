use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{DailyUsage, Identity, NewIdentity, Store, StoreError, UsageRecord, UsageStats};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    full_name TEXT,
    password_hash TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS identities_key_hash_idx ON identities (key_hash);

CREATE TABLE IF NOT EXISTS usage_records (
    id UUID PRIMARY KEY,
    identity_id UUID NOT NULL REFERENCES identities (id),
    endpoint TEXT NOT NULL,
    model TEXT NOT NULL,
    provider TEXT NOT NULL,
    input_tokens BIGINT NOT NULL,
    output_tokens BIGINT NOT NULL,
    total_tokens BIGINT NOT NULL,
    cost DOUBLE PRECISION NOT NULL,
    response_time_ms BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS usage_records_identity_created_idx
    ON usage_records (identity_id, created_at);
"#;

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    key_hash: String,
    is_active: bool,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            key_hash: row.key_hash,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    total_requests: i64,
    total_tokens: i64,
    total_cost: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct DailyRow {
    date: String,
    requests: i64,
    tokens: i64,
    cost: f64,
}

/// PostgreSQL-backed store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the schema. Idempotent; runs at every startup.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("database schema ready");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            INSERT INTO identities (id, email, username, full_name, password_hash, key_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, username, password_hash, key_hash, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.full_name)
        .bind(&new.password_hash)
        .bind(&new.key_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                StoreError::Duplicate("email or username")
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_identity_by_key_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, username, password_hash, key_hash, is_active
            FROM identities
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, username, password_hash, key_hash, is_active
            FROM identities
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn rotate_key_hash(&self, identity_id: Uuid, key_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE identities SET key_hash = $2 WHERE id = $1")
            .bind(identity_id)
            .bind(key_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_usage(&self, record: UsageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                id, identity_id, endpoint, model, provider,
                input_tokens, output_tokens, total_tokens, cost, response_time_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.identity_id)
        .bind(&record.endpoint)
        .bind(&record.model)
        .bind(&record.provider)
        .bind(record.input_tokens)
        .bind(record.output_tokens)
        .bind(record.total_tokens)
        .bind(record.cost)
        .bind(record.response_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn usage_stats(&self, identity_id: Uuid, days: i64) -> Result<UsageStats, StoreError> {
        let since = Utc::now() - chrono::Duration::days(days);

        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT count(*) AS total_requests,
                   coalesce(sum(total_tokens), 0)::bigint AS total_tokens,
                   coalesce(sum(cost), 0)::double precision AS total_cost
            FROM usage_records
            WHERE identity_id = $1 AND created_at >= $2
            "#,
        )
        .bind(identity_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let daily = sqlx::query_as::<_, DailyRow>(
            r#"
            SELECT to_char(created_at, 'YYYY-MM-DD') AS date,
                   count(*) AS requests,
                   coalesce(sum(total_tokens), 0)::bigint AS tokens,
                   coalesce(sum(cost), 0)::double precision AS cost
            FROM usage_records
            WHERE identity_id = $1 AND created_at >= $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(identity_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(UsageStats {
            total_requests: totals.total_requests,
            total_tokens: totals.total_tokens,
            total_cost: totals.total_cost,
            daily_usage: daily
                .into_iter()
                .map(|d| DailyUsage {
                    date: d.date,
                    requests: d.requests,
                    tokens: d.tokens,
                    cost: d.cost,
                })
                .collect(),
        })
    }
}
