//! Scripted match decider for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::dispatch::{DeciderError, MatchDecider, MatchDecision, MatchEntry};

/// A decider with a fixed default verdict and an optional script.
///
/// Scripted decisions are consumed front to back, then the default
/// applies. Every evaluated group is recorded (as its ticket ids) for
/// assertions.
#[derive(Debug)]
pub struct StaticDecider {
    default: MatchDecision,
    scripted: Arc<RwLock<VecDeque<MatchDecision>>>,
    evaluated: Arc<RwLock<Vec<Vec<String>>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl StaticDecider {
    pub fn new(default: MatchDecision) -> Self {
        Self {
            default,
            scripted: Arc::new(RwLock::new(VecDeque::new())),
            evaluated: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Accept every group as relayed (the default capability).
    pub fn relay_all() -> Self {
        Self::new(MatchDecision::Relayed)
    }

    /// Veto every group.
    pub fn reject_all() -> Self {
        Self::new(MatchDecision::Reject)
    }

    /// Accept every group as an authoritative match run by `handler`.
    pub fn authoritative(handler: &str) -> Self {
        Self::new(MatchDecision::Authoritative {
            handler: handler.to_string(),
        })
    }

    /// Queue a decision for the next evaluation.
    pub async fn push(&self, decision: MatchDecision) {
        self.scripted.write().await.push_back(decision);
    }

    /// Fail the next evaluation with the given message.
    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    /// Ticket-id lists of every group evaluated so far.
    pub async fn evaluated(&self) -> Vec<Vec<String>> {
        self.evaluated.read().await.clone()
    }
}

#[async_trait]
impl MatchDecider for StaticDecider {
    async fn evaluate(&self, group: &[MatchEntry]) -> Result<MatchDecision, DeciderError> {
        self.evaluated
            .write()
            .await
            .push(group.iter().map(|e| e.ticket_id.clone()).collect());

        if let Some(message) = self.next_error.write().await.take() {
            return Err(DeciderError::Failed(message));
        }
        let scripted = self.scripted.write().await.pop_front();
        Ok(scripted.unwrap_or_else(|| self.default.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_and_script() {
        let decider = StaticDecider::relay_all();
        decider.push(MatchDecision::Reject).await;

        assert_eq!(decider.evaluate(&[]).await.unwrap(), MatchDecision::Reject);
        assert_eq!(decider.evaluate(&[]).await.unwrap(), MatchDecision::Relayed);
        assert_eq!(decider.evaluated().await.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let decider = StaticDecider::relay_all();
        decider.fail_next("boom").await;
        assert!(decider.evaluate(&[]).await.is_err());
        assert!(decider.evaluate(&[]).await.is_ok());
    }
}
