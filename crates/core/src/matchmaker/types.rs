//! Types for the matchmaker facade.

use serde::{Deserialize, Serialize};

/// Current status of the matchmaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchmakerStatus {
    /// Whether the ticker is running.
    pub running: bool,
    /// Tickets currently held.
    pub ticket_count: usize,
    /// Distinct sessions with at least one open ticket.
    pub session_count: usize,
    /// Distinct parties with at least one open ticket.
    pub party_count: usize,
}
