//! The authoritative ticket store.
//!
//! Sole owner of ticket state: enforces per-session and per-party quotas
//! and bridges every mutation to the inverted index. The store lock is
//! always acquired before the index is written, and quota release is
//! atomic with removal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::index::TicketIndex;
use crate::query::{parse_query, QueryError};

use super::types::{AddTicket, Presence, Ticket};

/// Errors reported to the add caller. No state changes on failure.
#[derive(Debug, Error)]
pub enum AddError {
    /// The query string failed to compile.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Count bounds were inconsistent.
    #[error("invalid count: {0}")]
    InvalidCount(String),

    /// Two presences carried the same session id.
    #[error("duplicate session: {0}")]
    DuplicateSession(String),

    /// A session or party hit the concurrent-ticket cap.
    #[error("too many tickets for {owner} (limit {limit})")]
    TooManyTickets { owner: String, limit: usize },
}

/// Errors on the remove paths. Removing an absent ticket is reported but
/// leaves the store unchanged, so callers may retry freely.
#[derive(Debug, Error)]
pub enum RemoveError {
    #[error("ticket not found: {0}")]
    NotFound(String),
}

/// Point-in-time counters for status and metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub ticket_count: usize,
    pub session_count: usize,
    pub party_count: usize,
}

#[derive(Default)]
struct StoreInner {
    tickets: HashMap<String, Ticket>,
    /// session id -> open ticket ids.
    session_tickets: HashMap<String, HashSet<String>>,
    /// party id -> open ticket ids.
    party_tickets: HashMap<String, HashSet<String>>,
}

impl StoreInner {
    /// Unlink a ticket from both quota maps and the index.
    fn unlink(&mut self, ticket: &Ticket, index: &TicketIndex) {
        for session_id in &ticket.session_ids {
            if let Some(ids) = self.session_tickets.get_mut(session_id) {
                ids.remove(&ticket.ticket_id);
                if ids.is_empty() {
                    self.session_tickets.remove(session_id);
                }
            }
        }
        if !ticket.party_id.is_empty() {
            if let Some(ids) = self.party_tickets.get_mut(&ticket.party_id) {
                ids.remove(&ticket.ticket_id);
                if ids.is_empty() {
                    self.party_tickets.remove(&ticket.party_id);
                }
            }
        }
        index.remove(&ticket.ticket_id);
    }
}

/// The ticket store. One instance per matchmaker; see the module docs for
/// the locking discipline.
pub struct TicketStore {
    max_tickets: usize,
    index: Arc<TicketIndex>,
    inner: RwLock<StoreInner>,
}

impl TicketStore {
    pub fn new(max_tickets: usize, index: Arc<TicketIndex>) -> Self {
        Self {
            max_tickets,
            index,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Validate, enforce quotas, index and insert a new ticket. Returns the
    /// generated ticket id and the presence list echoed for acknowledgement.
    pub async fn add(&self, request: AddTicket) -> Result<(String, Vec<Presence>), AddError> {
        let own_count = request.presences.len();
        if own_count == 0 {
            return Err(AddError::InvalidCount("ticket has no presences".to_string()));
        }
        if request.min_count < 1 {
            return Err(AddError::InvalidCount("min_count must be at least 1".to_string()));
        }
        if request.max_count < request.min_count {
            return Err(AddError::InvalidCount(format!(
                "max_count {} is below min_count {}",
                request.max_count, request.min_count
            )));
        }
        if request.count_multiple < 1 {
            return Err(AddError::InvalidCount(
                "count_multiple must be at least 1".to_string(),
            ));
        }
        if own_count > request.max_count {
            return Err(AddError::InvalidCount(format!(
                "ticket carries {} presences but max_count is {}",
                own_count, request.max_count
            )));
        }

        let mut session_ids: HashSet<String> = HashSet::with_capacity(own_count);
        for presence in &request.presences {
            if !session_ids.insert(presence.session_id.clone()) {
                return Err(AddError::DuplicateSession(presence.session_id.clone()));
            }
        }

        let query = Arc::new(parse_query(&request.query)?);

        let mut inner = self.inner.write().await;

        for session_id in &session_ids {
            let open = inner.session_tickets.get(session_id).map_or(0, |s| s.len());
            if open + 1 > self.max_tickets {
                return Err(AddError::TooManyTickets {
                    owner: session_id.clone(),
                    limit: self.max_tickets,
                });
            }
        }
        if !request.party_id.is_empty() {
            let open = inner
                .party_tickets
                .get(&request.party_id)
                .map_or(0, |s| s.len());
            if open + 1 > self.max_tickets {
                return Err(AddError::TooManyTickets {
                    owner: request.party_id.clone(),
                    limit: self.max_tickets,
                });
            }
        }

        let ticket_id = Uuid::new_v4().to_string();
        let ticket = Ticket {
            ticket_id: ticket_id.clone(),
            presences: request.presences.clone(),
            session_ids: session_ids.clone(),
            party_id: request.party_id.clone(),
            query,
            string_properties: request.string_properties,
            numeric_properties: request.numeric_properties,
            min_count: request.min_count,
            max_count: request.max_count,
            count_multiple: request.count_multiple,
            own_count,
            created_at: now_nanos(),
            intervals: 0,
            active: true,
        };

        // Store lock is held across the index write so the two can never
        // disagree on membership.
        self.index.insert(&ticket_id, ticket.document());
        for session_id in session_ids {
            inner
                .session_tickets
                .entry(session_id)
                .or_default()
                .insert(ticket_id.clone());
        }
        if !request.party_id.is_empty() {
            inner
                .party_tickets
                .entry(request.party_id)
                .or_default()
                .insert(ticket_id.clone());
        }
        inner.tickets.insert(ticket_id.clone(), ticket);

        Ok((ticket_id, request.presences))
    }

    /// Remove one ticket on behalf of a session. The session must be among
    /// the ticket's presences.
    pub async fn remove_session(&self, session_id: &str, ticket_id: &str) -> Result<(), RemoveError> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .tickets
            .get(ticket_id)
            .is_some_and(|t| t.session_ids.contains(session_id));
        if !owned {
            return Err(RemoveError::NotFound(ticket_id.to_string()));
        }
        if let Some(ticket) = inner.tickets.remove(ticket_id) {
            inner.unlink(&ticket, &self.index);
        }
        Ok(())
    }

    /// Remove one ticket on behalf of a party.
    pub async fn remove_party(&self, party_id: &str, ticket_id: &str) -> Result<(), RemoveError> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .tickets
            .get(ticket_id)
            .is_some_and(|t| t.party_id == party_id);
        if !owned {
            return Err(RemoveError::NotFound(ticket_id.to_string()));
        }
        if let Some(ticket) = inner.tickets.remove(ticket_id) {
            inner.unlink(&ticket, &self.index);
        }
        Ok(())
    }

    /// Bulk purge for a disconnecting session. Returns the number removed.
    pub async fn remove_all_session(&self, session_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let ids: Vec<String> = inner
            .session_tickets
            .get(session_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        for ticket_id in &ids {
            if let Some(ticket) = inner.tickets.remove(ticket_id) {
                inner.unlink(&ticket, &self.index);
            }
        }
        ids.len()
    }

    /// Bulk purge for a disbanding party. Returns the number removed.
    pub async fn remove_all_party(&self, party_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let ids: Vec<String> = inner
            .party_tickets
            .get(party_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        for ticket_id in &ids {
            if let Some(ticket) = inner.tickets.remove(ticket_id) {
                inner.unlink(&ticket, &self.index);
            }
        }
        ids.len()
    }

    /// Snapshot of every active ticket.
    pub async fn list_active(&self) -> Vec<Ticket> {
        let inner = self.inner.read().await;
        inner
            .tickets
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect()
    }

    pub async fn get(&self, ticket_id: &str) -> Option<Ticket> {
        self.inner.read().await.tickets.get(ticket_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tickets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tickets.is_empty()
    }

    /// Open tickets currently held by a session.
    pub async fn session_ticket_count(&self, session_id: &str) -> usize {
        self.inner
            .read()
            .await
            .session_tickets
            .get(session_id)
            .map_or(0, |s| s.len())
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            ticket_count: inner.tickets.len(),
            session_count: inner.session_tickets.len(),
            party_count: inner.party_tickets.len(),
        }
    }

    /// Advance the widening clock at the start of a round: bump `intervals`
    /// on every active ticket, expire those reaching `max_intervals`, and
    /// return (remaining active snapshot, expired tickets).
    pub(crate) async fn advance_intervals(&self, max_intervals: u32) -> (Vec<Ticket>, Vec<Ticket>) {
        let mut inner = self.inner.write().await;

        let mut expired_ids = Vec::new();
        for ticket in inner.tickets.values_mut() {
            if !ticket.active {
                continue;
            }
            ticket.intervals += 1;
            if ticket.intervals >= max_intervals {
                expired_ids.push(ticket.ticket_id.clone());
            }
        }

        let mut expired = Vec::with_capacity(expired_ids.len());
        for ticket_id in expired_ids {
            if let Some(ticket) = inner.tickets.remove(&ticket_id) {
                inner.unlink(&ticket, &self.index);
                expired.push(ticket);
            }
        }

        let remaining = inner
            .tickets
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        (remaining, expired)
    }

    /// Atomically remove a matched group. Returns `None` without touching
    /// anything when any member has been removed concurrently, so the
    /// caller can discard the group silently.
    pub(crate) async fn commit_group(&self, ticket_ids: &[String]) -> Option<Vec<Ticket>> {
        let mut inner = self.inner.write().await;
        if !ticket_ids.iter().all(|id| inner.tickets.contains_key(id)) {
            return None;
        }

        let mut removed = Vec::with_capacity(ticket_ids.len());
        for ticket_id in ticket_ids {
            if let Some(ticket) = inner.tickets.remove(ticket_id) {
                inner.unlink(&ticket, &self.index);
                removed.push(ticket);
            }
        }
        Some(removed)
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
