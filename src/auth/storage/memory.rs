//! In-memory token storage.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StoredToken, TokenSchema, TokenStore};
use crate::Result;

/// Process-local store, useful for stateless deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<DashMap<(TokenSchema, String), StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, account: &str, schema: TokenSchema) -> Result<Option<StoredToken>> {
        Ok(self
            .tokens
            .get(&(schema, account.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, account: &str, schema: TokenSchema, token: &StoredToken) -> Result<()> {
        self.tokens
            .insert((schema, account.to_string()), token.clone());
        Ok(())
    }

    async fn remove(&self, account: &str, schema: TokenSchema) -> Result<bool> {
        Ok(self.tokens.remove(&(schema, account.to_string())).is_some())
    }

    async fn accounts(&self, schema: TokenSchema) -> Result<Vec<String>> {
        let mut accounts: Vec<String> = self
            .tokens
            .iter()
            .filter(|entry| entry.key().0 == schema)
            .map(|entry| entry.key().1.clone())
            .collect();
        accounts.sort();
        Ok(accounts)
    }
}
