//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external collaborator
//! traits (message router, match registry, match decider), allowing
//! comprehensive matchmaking tests without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use rallypoint_core::testing::{fixtures, MockRegistry, MockRouter, StaticDecider};
//!
//! let router = Arc::new(MockRouter::new());
//! let registry = Arc::new(MockRegistry::new());
//!
//! let matchmaker = Matchmaker::new(config, router.clone(), registry.clone());
//! matchmaker.add(fixtures::ticket(1, "+properties.mode:coop", 2, 2)).await?;
//! matchmaker.process().await;
//!
//! // Assert on what was delivered
//! let delivered = router.delivered().await;
//! ```

mod decider;
mod mock_registry;
mod mock_router;

pub use decider::StaticDecider;
pub use mock_registry::MockRegistry;
pub use mock_router::MockRouter;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashMap;

    use crate::ticket::{AddTicket, Presence};

    /// Create a numbered test presence.
    pub fn presence(n: u32) -> Presence {
        Presence {
            user_id: format!("user-{}", n),
            session_id: format!("session-{}", n),
            username: format!("player{}", n),
            node_tag: "node-1".to_string(),
        }
    }

    /// A solo add request for presence `n`.
    pub fn ticket(n: u32, query: &str, min_count: usize, max_count: usize) -> AddTicket {
        AddTicket::new(presence(n), query, min_count, max_count)
    }

    /// A solo add request with properties attached.
    pub fn ticket_with_props(
        n: u32,
        query: &str,
        min_count: usize,
        max_count: usize,
        string_properties: &[(&str, &str)],
        numeric_properties: &[(&str, f64)],
    ) -> AddTicket {
        let mut request = ticket(n, query, min_count, max_count);
        request.string_properties = string_properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        request.numeric_properties = numeric_properties
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<HashMap<_, _>>();
        request
    }

    /// A party add request covering presences `ns`.
    pub fn party_ticket(
        ns: &[u32],
        party_id: &str,
        query: &str,
        min_count: usize,
        max_count: usize,
    ) -> AddTicket {
        AddTicket {
            presences: ns.iter().map(|n| presence(*n)).collect(),
            party_id: party_id.to_string(),
            query: query.to_string(),
            min_count,
            max_count,
            count_multiple: 1,
            string_properties: HashMap::new(),
            numeric_properties: HashMap::new(),
        }
    }
}
