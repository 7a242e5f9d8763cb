//! Mock message router for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::dispatch::{MatchEnvelope, MessageRouter, RouteError};
use crate::ticket::Presence;

/// Mock implementation of the [`MessageRouter`] trait.
///
/// Records every delivered envelope for assertions and can be told to fail
/// the next delivery.
#[derive(Debug, Default)]
pub struct MockRouter {
    delivered: Arc<RwLock<Vec<(Presence, MatchEnvelope)>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    pub async fn delivered(&self) -> Vec<(Presence, MatchEnvelope)> {
        self.delivered.read().await.clone()
    }

    /// Envelopes delivered to one session.
    pub async fn envelopes_for(&self, session_id: &str) -> Vec<MatchEnvelope> {
        self.delivered
            .read()
            .await
            .iter()
            .filter(|(p, _)| p.session_id == session_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Fail the next delivery with the given message.
    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    /// Drop everything recorded so far.
    pub async fn clear(&self) {
        self.delivered.write().await.clear();
    }
}

#[async_trait]
impl MessageRouter for MockRouter {
    async fn deliver(
        &self,
        recipient: &Presence,
        envelope: MatchEnvelope,
    ) -> Result<(), RouteError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(RouteError::Failed(message));
        }
        self.delivered
            .write()
            .await
            .push((recipient.clone(), envelope));
        Ok(())
    }
}
