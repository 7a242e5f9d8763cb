//! Types crossing the dispatch seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::{Presence, Ticket};

/// One ticket's slice of a proposed match group, as seen by the decider
/// and the dispatcher.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub ticket_id: String,
    pub presences: Vec<Presence>,
    pub party_id: String,
    pub string_properties: HashMap<String, String>,
    pub numeric_properties: HashMap<String, f64>,
}

impl From<&Ticket> for MatchEntry {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            presences: ticket.presences.clone(),
            party_id: ticket.party_id.clone(),
            string_properties: ticket.string_properties.clone(),
            numeric_properties: ticket.numeric_properties.clone(),
        }
    }
}

/// One matched participant as carried in envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedUser {
    pub user_id: String,
    pub session_id: String,
    pub username: String,
    pub string_properties: HashMap<String, String>,
    pub numeric_properties: HashMap<String, f64>,
}

/// The per-recipient notification handed to the message router.
///
/// Exactly one of `match_id` and `token` is set for a successful match;
/// both are empty for an expiry notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEnvelope {
    /// The recipient's own ticket.
    pub ticket_id: String,
    /// Authoritative match identifier, when the registry materialized one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// Rendezvous token for relayed matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Every participant of the match, the recipient included.
    pub users: Vec<MatchedUser>,
}

impl MatchEnvelope {
    /// An expiry notification: no users, no match, no token.
    pub fn empty(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            match_id: None,
            token: None,
            users: Vec::new(),
        }
    }
}

/// Verdict of the injected match-decision capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    /// Veto the proposed group.
    Reject,
    /// Accept as a peer-relayed match; recipients get a rendezvous token.
    Relayed,
    /// Accept and materialize a server-side match through the registry,
    /// using the named handler.
    Authoritative { handler: String },
}

#[derive(Debug, Error)]
pub enum RouteError {
    /// The recipient's session is gone; the envelope is dropped.
    #[error("recipient unavailable: {0}")]
    Unavailable(String),

    #[error("router failure: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("match registry failure: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum DeciderError {
    #[error("match decider failure: {0}")]
    Failed(String),
}

/// Sends envelopes to live sessions. Implementations resolve
/// `session_id -> sink` at delivery time and silently drop missing sinks.
#[async_trait]
pub trait MessageRouter: Send + Sync {
    async fn deliver(&self, recipient: &Presence, envelope: MatchEnvelope)
        -> Result<(), RouteError>;
}

/// Factory for authoritative server-side match instances.
#[async_trait]
pub trait MatchRegistry: Send + Sync {
    /// Create a match run by `handler` and return its opaque identifier.
    async fn create_match(
        &self,
        handler: &str,
        users: &[MatchedUser],
    ) -> Result<String, RegistryError>;
}

/// The injected match-decision capability. Called once per proposed group
/// that survived mutual verification; errors count as a rejection.
#[async_trait]
pub trait MatchDecider: Send + Sync {
    async fn evaluate(&self, group: &[MatchEntry]) -> Result<MatchDecision, DeciderError>;
}

/// Default decider: accepts every group as a relayed match.
#[derive(Debug, Default)]
pub struct RelayAllDecider;

#[async_trait]
impl MatchDecider for RelayAllDecider {
    async fn evaluate(&self, _group: &[MatchEntry]) -> Result<MatchDecision, DeciderError> {
        Ok(MatchDecision::Relayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_envelope() {
        let envelope = MatchEnvelope::empty("ticket-1");
        assert_eq!(envelope.ticket_id, "ticket-1");
        assert!(envelope.match_id.is_none());
        assert!(envelope.token.is_none());
        assert!(envelope.users.is_empty());
    }

    #[test]
    fn test_envelope_serialization_skips_empty_fields() {
        let envelope = MatchEnvelope::empty("ticket-1");
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("match_id"));
        assert!(!json.contains("token"));

        let parsed: MatchEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ticket_id, "ticket-1");
    }

    #[tokio::test]
    async fn test_relay_all_decider() {
        let decider = RelayAllDecider;
        let decision = decider.evaluate(&[]).await.unwrap();
        assert_eq!(decision, MatchDecision::Relayed);
    }
}
