//! In-memory user store for tests and local development

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreError, UserStore};
use crate::auth::{Nonce, WalletAddress};
use crate::models::UserRecord;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<WalletAddress, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, address: &WalletAddress) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(address).cloned())
    }

    async fn create_user(
        &self,
        address: &WalletAddress,
        nonce: Nonce,
    ) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;

        if users.contains_key(address) {
            return Err(StoreError::AlreadyExists(address.clone()));
        }

        let now = Utc::now();
        let record = UserRecord {
            address: address.clone(),
            nonce,
            created_at: now,
            updated_at: now,
        };
        users.insert(address.clone(), record.clone());

        Ok(record)
    }

    async fn update_nonce(
        &self,
        address: &WalletAddress,
        expected: Nonce,
        next: Nonce,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;

        match users.get_mut(address) {
            Some(record) if record.nonce == expected => {
                record.nonce = next;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
