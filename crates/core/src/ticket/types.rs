//! Core ticket data types.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::{
    Document, FIELD_CREATED_AT, FIELD_MAX_COUNT, FIELD_MIN_COUNT, FIELD_PARTY_ID,
    FIELD_SESSION_IDS, PROPERTY_PREFIX,
};
use crate::query::CompiledQuery;

/// One human participant of a ticket.
///
/// Multiple presences share a ticket when the ticket represents a
/// pre-formed party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presence {
    /// Stable user identifier.
    pub user_id: String,
    /// Live session identifier; the routing key for notifications.
    pub session_id: String,
    /// Display name echoed into match envelopes.
    pub username: String,
    /// Identifier of the node holding the session.
    pub node_tag: String,
}

/// Request to add a ticket to the matchmaker.
#[derive(Debug, Clone)]
pub struct AddTicket {
    /// Participants; all must belong to `party_id` when it is non-empty.
    pub presences: Vec<Presence>,
    /// Empty for solo tickets.
    pub party_id: String,
    /// Query string in the matchmaking query grammar.
    pub query: String,
    /// Lower bound on total presences in a match.
    pub min_count: usize,
    /// Upper bound on total presences in a match.
    pub max_count: usize,
    /// The matched total must be a multiple of this.
    pub count_multiple: usize,
    /// Indexed under `properties.<key>` as text.
    pub string_properties: HashMap<String, String>,
    /// Indexed under `properties.<key>` as numbers.
    pub numeric_properties: HashMap<String, f64>,
}

impl AddTicket {
    /// A solo request with count bounds `[min, max]` and multiple 1.
    pub fn new(
        presence: Presence,
        query: impl Into<String>,
        min_count: usize,
        max_count: usize,
    ) -> Self {
        Self {
            presences: vec![presence],
            party_id: String::new(),
            query: query.into(),
            min_count,
            max_count,
            count_multiple: 1,
            string_properties: HashMap::new(),
            numeric_properties: HashMap::new(),
        }
    }
}

/// A live matchmaking ticket. Identity is immutable; `intervals` advances
/// every tick the ticket stays unmatched.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub ticket_id: String,
    pub presences: Vec<Presence>,
    pub session_ids: HashSet<String>,
    pub party_id: String,
    pub query: Arc<CompiledQuery>,
    pub string_properties: HashMap<String, String>,
    pub numeric_properties: HashMap<String, f64>,
    pub min_count: usize,
    pub max_count: usize,
    pub count_multiple: usize,
    /// Presences contributed by this ticket.
    pub own_count: usize,
    /// Nanosecond timestamp set at add; drives outer-loop ordering.
    pub created_at: i64,
    /// Ticks survived so far; the ticket expires at `max_intervals`.
    pub intervals: u32,
    /// Outer-loop candidacy flag for the current round.
    pub active: bool,
}

impl Ticket {
    /// Build the indexed document: namespaced properties plus the reserved
    /// system fields.
    pub fn document(&self) -> Document {
        let mut doc = Document::new();
        for (key, value) in &self.string_properties {
            doc.push_text(format!("{}{}", PROPERTY_PREFIX, key), value.clone());
        }
        for (key, value) in &self.numeric_properties {
            doc.set_numeric(format!("{}{}", PROPERTY_PREFIX, key), *value);
        }

        doc.set_numeric(FIELD_CREATED_AT, self.created_at as f64);
        doc.set_numeric(FIELD_MIN_COUNT, self.min_count as f64);
        doc.set_numeric(FIELD_MAX_COUNT, self.max_count as f64);
        if !self.party_id.is_empty() {
            doc.push_text(FIELD_PARTY_ID, self.party_id.clone());
        }
        for session_id in &self.session_ids {
            doc.push_text(FIELD_SESSION_IDS, session_id.clone());
        }

        doc
    }

    /// True when the two tickets share any session.
    pub fn shares_session_with(&self, other: &Ticket) -> bool {
        self.session_ids.iter().any(|s| other.session_ids.contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    fn presence(n: u32) -> Presence {
        Presence {
            user_id: format!("user-{}", n),
            session_id: format!("session-{}", n),
            username: format!("player{}", n),
            node_tag: "node-1".to_string(),
        }
    }

    fn ticket(presences: Vec<Presence>, party_id: &str) -> Ticket {
        let session_ids = presences.iter().map(|p| p.session_id.clone()).collect();
        let own_count = presences.len();
        Ticket {
            ticket_id: "t-1".to_string(),
            presences,
            session_ids,
            party_id: party_id.to_string(),
            query: Arc::new(parse_query("*").unwrap()),
            string_properties: HashMap::from([("mode".to_string(), "coop".to_string())]),
            numeric_properties: HashMap::from([("skill".to_string(), 7.0)]),
            min_count: 2,
            max_count: 4,
            count_multiple: 1,
            own_count,
            created_at: 42,
            intervals: 0,
            active: true,
        }
    }

    #[test]
    fn test_document_namespaces_properties() {
        let doc = ticket(vec![presence(1)], "").document();
        assert_eq!(
            doc.text_values("properties.mode").unwrap(),
            &["coop".to_string()]
        );
        assert_eq!(doc.numeric("properties.skill"), Some(7.0));
    }

    #[test]
    fn test_document_system_fields() {
        let doc = ticket(vec![presence(1), presence(2)], "party-9").document();
        assert_eq!(doc.numeric(FIELD_MIN_COUNT), Some(2.0));
        assert_eq!(doc.numeric(FIELD_MAX_COUNT), Some(4.0));
        assert_eq!(doc.numeric(FIELD_CREATED_AT), Some(42.0));
        assert_eq!(
            doc.text_values(FIELD_PARTY_ID).unwrap(),
            &["party-9".to_string()]
        );
        assert_eq!(doc.text_values(FIELD_SESSION_IDS).unwrap().len(), 2);
    }

    #[test]
    fn test_solo_ticket_has_no_party_field() {
        let doc = ticket(vec![presence(1)], "").document();
        assert!(doc.text_values(FIELD_PARTY_ID).is_none());
    }

    #[test]
    fn test_shares_session_with() {
        let a = ticket(vec![presence(1), presence(2)], "");
        let b = ticket(vec![presence(2), presence(3)], "");
        let c = ticket(vec![presence(4)], "");
        assert!(a.shares_session_with(&b));
        assert!(!a.shares_session_with(&c));
    }
}
