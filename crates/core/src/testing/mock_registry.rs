//! Mock match registry for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::dispatch::{MatchRegistry, MatchedUser, RegistryError};

/// Mock implementation of the [`MatchRegistry`] trait.
///
/// Hands out sequential match ids (`match-1`, `match-2`, …) and records
/// every created match for assertions.
#[derive(Debug, Default)]
pub struct MockRegistry {
    counter: AtomicU64,
    created: Arc<RwLock<Vec<(String, String, Vec<MatchedUser>)>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches created so far as (handler, match_id, users).
    pub async fn created(&self) -> Vec<(String, String, Vec<MatchedUser>)> {
        self.created.read().await.clone()
    }

    /// Fail the next create with the given message.
    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }
}

#[async_trait]
impl MatchRegistry for MockRegistry {
    async fn create_match(
        &self,
        handler: &str,
        users: &[MatchedUser],
    ) -> Result<String, RegistryError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(RegistryError::Failed(message));
        }
        let match_id = format!("match-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.created
            .write()
            .await
            .push((handler.to_string(), match_id.clone(), users.to_vec()));
        Ok(match_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_match_ids() {
        let registry = MockRegistry::new();
        let a = registry.create_match("arena", &[]).await.unwrap();
        let b = registry.create_match("arena", &[]).await.unwrap();
        assert_eq!(a, "match-1");
        assert_eq!(b, "match-2");
        assert_eq!(registry.created().await.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let registry = MockRegistry::new();
        registry.fail_next("down").await;
        assert!(registry.create_match("arena", &[]).await.is_err());
        assert!(registry.create_match("arena", &[]).await.is_ok());
    }
}
