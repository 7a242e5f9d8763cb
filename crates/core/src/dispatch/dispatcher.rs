//! Builds and delivers match envelopes.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::metrics;

use super::token::TokenMinter;
use super::types::{
    MatchDecision, MatchEntry, MatchEnvelope, MatchRegistry, MatchedUser, MessageRouter,
};

/// Turns committed groups into per-recipient envelopes and hands them to
/// the message router. Runs strictly after the commit: failures here are
/// logged and absorbed, never rolled back.
pub struct ResultDispatcher {
    router: Arc<dyn MessageRouter>,
    registry: Arc<dyn MatchRegistry>,
    minter: TokenMinter,
}

impl ResultDispatcher {
    pub fn new(
        router: Arc<dyn MessageRouter>,
        registry: Arc<dyn MatchRegistry>,
        minter: TokenMinter,
    ) -> Self {
        Self {
            router,
            registry,
            minter,
        }
    }

    /// Notify every presence of an accepted group.
    ///
    /// Authoritative decisions go through the registry factory first; if it
    /// fails the envelopes go out without a match id and clients reconcile.
    pub async fn dispatch_matched(&self, group: &[MatchEntry], decision: &MatchDecision) {
        let users = collect_users(group);

        let match_id = match decision {
            MatchDecision::Reject => return,
            MatchDecision::Relayed => None,
            MatchDecision::Authoritative { handler } => {
                match self.registry.create_match(handler, &users).await {
                    Ok(match_id) => {
                        debug!(%match_id, %handler, "authoritative match created");
                        Some(match_id)
                    }
                    Err(e) => {
                        warn!("match registry failed for handler {}: {}", handler, e);
                        metrics::DISPATCH_FAILURES
                            .with_label_values(&["registry"])
                            .inc();
                        None
                    }
                }
            }
        };
        let relayed = matches!(decision, MatchDecision::Relayed);

        let mut deliveries = Vec::new();
        for entry in group {
            for presence in &entry.presences {
                let token = relayed.then(|| self.minter.mint(&presence.user_id, &presence.session_id));
                let envelope = MatchEnvelope {
                    ticket_id: entry.ticket_id.clone(),
                    match_id: match_id.clone(),
                    token,
                    users: users.clone(),
                };
                deliveries.push(self.deliver_one(presence.clone(), envelope));
            }
        }
        join_all(deliveries).await;

        let kind = if match_id.is_some() {
            "authoritative"
        } else {
            "relayed"
        };
        metrics::MATCHES_FORMED.with_label_values(&[kind]).inc();
        metrics::MATCH_SIZE.observe(users.len() as f64);
    }

    /// Notify a ticket's presences that it expired unmatched.
    pub async fn dispatch_expired(&self, entry: &MatchEntry) {
        let deliveries: Vec<_> = entry
            .presences
            .iter()
            .map(|presence| {
                self.deliver_one(presence.clone(), MatchEnvelope::empty(&entry.ticket_id))
            })
            .collect();
        join_all(deliveries).await;
    }

    async fn deliver_one(&self, recipient: crate::ticket::Presence, envelope: MatchEnvelope) {
        if let Err(e) = self.router.deliver(&recipient, envelope).await {
            warn!(
                session_id = %recipient.session_id,
                "failed to deliver match envelope: {}", e
            );
            metrics::DISPATCH_FAILURES
                .with_label_values(&["router"])
                .inc();
        }
    }
}

fn collect_users(group: &[MatchEntry]) -> Vec<MatchedUser> {
    group
        .iter()
        .flat_map(|entry| {
            entry.presences.iter().map(|presence| MatchedUser {
                user_id: presence.user_id.clone(),
                session_id: presence.session_id.clone(),
                username: presence.username.clone(),
                string_properties: entry.string_properties.clone(),
                numeric_properties: entry.numeric_properties.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::testing::{MockRegistry, MockRouter};
    use crate::ticket::Presence;

    fn entry(ticket_id: &str, sessions: &[u32]) -> MatchEntry {
        MatchEntry {
            ticket_id: ticket_id.to_string(),
            presences: sessions
                .iter()
                .map(|n| Presence {
                    user_id: format!("user-{}", n),
                    session_id: format!("session-{}", n),
                    username: format!("player{}", n),
                    node_tag: "node-1".to_string(),
                })
                .collect(),
            party_id: String::new(),
            string_properties: HashMap::from([("mode".to_string(), "coop".to_string())]),
            numeric_properties: HashMap::new(),
        }
    }

    fn dispatcher(router: &Arc<MockRouter>, registry: &Arc<MockRegistry>) -> ResultDispatcher {
        ResultDispatcher::new(
            Arc::clone(router) as Arc<dyn MessageRouter>,
            Arc::clone(registry) as Arc<dyn MatchRegistry>,
            TokenMinter::new("test-secret", Duration::from_secs(30)),
        )
    }

    #[tokio::test]
    async fn test_relayed_dispatch_mints_tokens() {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        let d = dispatcher(&router, &registry);

        let group = vec![entry("t1", &[1]), entry("t2", &[2])];
        d.dispatch_matched(&group, &MatchDecision::Relayed).await;

        let delivered = router.delivered().await;
        assert_eq!(delivered.len(), 2);
        for (recipient, envelope) in &delivered {
            assert!(envelope.match_id.is_none());
            let token = envelope.token.as_ref().unwrap();
            assert!(token.contains(&recipient.user_id));
            assert_eq!(envelope.users.len(), 2);
        }
        assert!(registry.created().await.is_empty());
    }

    #[tokio::test]
    async fn test_authoritative_dispatch_uses_registry() {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        let d = dispatcher(&router, &registry);

        let group = vec![entry("t1", &[1]), entry("t2", &[2])];
        d.dispatch_matched(
            &group,
            &MatchDecision::Authoritative {
                handler: "arena".to_string(),
            },
        )
        .await;

        let created = registry.created().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "arena");

        for (_, envelope) in router.delivered().await {
            assert_eq!(envelope.match_id.as_deref(), Some(created[0].1.as_str()));
            assert!(envelope.token.is_none());
        }
    }

    #[tokio::test]
    async fn test_registry_failure_does_not_block_delivery() {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        registry.fail_next("registry down").await;
        let d = dispatcher(&router, &registry);

        let group = vec![entry("t1", &[1])];
        d.dispatch_matched(
            &group,
            &MatchDecision::Authoritative {
                handler: "arena".to_string(),
            },
        )
        .await;

        let delivered = router.delivered().await;
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].1.match_id.is_none());
    }

    #[tokio::test]
    async fn test_router_failure_is_absorbed() {
        let router = Arc::new(MockRouter::new());
        router.fail_next("session gone").await;
        let registry = Arc::new(MockRegistry::new());
        let d = dispatcher(&router, &registry);

        let group = vec![entry("t1", &[1]), entry("t2", &[2])];
        d.dispatch_matched(&group, &MatchDecision::Relayed).await;

        // One delivery failed, the other still went out.
        assert_eq!(router.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_dispatch_sends_empty_envelope() {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        let d = dispatcher(&router, &registry);

        d.dispatch_expired(&entry("t1", &[1, 2])).await;

        let delivered = router.delivered().await;
        assert_eq!(delivered.len(), 2);
        for (_, envelope) in delivered {
            assert_eq!(envelope.ticket_id, "t1");
            assert!(envelope.users.is_empty());
            assert!(envelope.match_id.is_none());
            assert!(envelope.token.is_none());
        }
    }

    #[tokio::test]
    async fn test_envelope_per_ticket_carries_own_ticket_id() {
        let router = Arc::new(MockRouter::new());
        let registry = Arc::new(MockRegistry::new());
        let d = dispatcher(&router, &registry);

        let group = vec![entry("t1", &[1]), entry("t2", &[2])];
        d.dispatch_matched(&group, &MatchDecision::Relayed).await;

        for (recipient, envelope) in router.delivered().await {
            let expected = if recipient.session_id == "session-1" {
                "t1"
            } else {
                "t2"
            };
            assert_eq!(envelope.ticket_id, expected);
        }
    }
}
