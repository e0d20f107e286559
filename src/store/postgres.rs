//! PostgreSQL user store
//!
//! Connection pooling, embedded migrations and the `users` table queries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{StoreError, UserStore};
use crate::auth::{Nonce, WalletAddress};
use crate::models::UserRecord;

/// Create a database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    address: String,
    nonce: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let address = row
            .address
            .parse::<WalletAddress>()
            .map_err(|e| StoreError::InvalidRecord(format!("{}: {}", row.address, e)))?;
        let nonce =
            Nonce::try_from(row.nonce).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        Ok(UserRecord {
            address,
            nonce,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user(&self, address: &WalletAddress) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT address, nonce, created_at, updated_at
            FROM users
            WHERE address = $1
            "#,
        )
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn create_user(
        &self,
        address: &WalletAddress,
        nonce: Nonce,
    ) -> Result<UserRecord, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            INSERT INTO users (address, nonce, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (address) DO NOTHING
            RETURNING address, nonce, created_at, updated_at
            "#,
        )
        .bind(address.as_str())
        .bind(i64::from(nonce))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::AlreadyExists(address.clone())),
        }
    }

    async fn update_nonce(
        &self,
        address: &WalletAddress,
        expected: Nonce,
        next: Nonce,
    ) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET nonce = $3, updated_at = NOW()
            WHERE address = $1 AND nonce = $2
            "#,
        )
        .bind(address.as_str())
        .bind(i64::from(expected))
        .bind(i64::from(next))
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
