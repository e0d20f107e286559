//! User record storage
//!
//! The auth core reaches wallet records only through [`UserStore`]. Every
//! backend must make [`UserStore::update_nonce`] a compare-and-swap so a
//! consumed nonce can never be restored by a concurrent writer.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::{Nonce, WalletAddress};
use crate::config::StoreConfig;
use crate::models::UserRecord;

mod hasura;
mod memory;
mod postgres;

pub use hasura::HasuraUserStore;
pub use memory::InMemoryUserStore;
pub use postgres::{create_pool, run_migrations, PgUserStore};

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("User already exists: {0}")]
    AlreadyExists(WalletAddress),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, address: &WalletAddress) -> Result<Option<UserRecord>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the address has a record
    async fn create_user(
        &self,
        address: &WalletAddress,
        nonce: Nonce,
    ) -> Result<UserRecord, StoreError>;

    /// Replace the nonce only if it still equals `expected`.
    ///
    /// Returns `false` when the stored nonce differs or the user is missing.
    async fn update_nonce(
        &self,
        address: &WalletAddress,
        expected: Nonce,
        next: Nonce,
    ) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Build the store selected by configuration
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn UserStore>, StoreError> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory user store, records are lost on restart");
            Ok(Arc::new(InMemoryUserStore::new()))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = create_pool(database_url, *max_connections).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PgUserStore::new(pool)))
        }
        StoreConfig::Hasura {
            endpoint,
            admin_secret,
        } => {
            tracing::info!(endpoint = %endpoint, "Using Hasura user store");
            Ok(Arc::new(HasuraUserStore::new(
                endpoint.clone(),
                admin_secret.clone(),
            )?))
        }
    }
}
