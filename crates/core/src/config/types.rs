use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub matchmaker: MatchmakerConfig,
}

/// Matchmaker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchmakerConfig {
    /// Ticker period in seconds.
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u64,
    /// Ticks a ticket survives before it expires.
    #[serde(default = "default_max_intervals")]
    pub max_intervals: u32,
    /// Concurrent open tickets allowed per session and per party.
    #[serde(default = "default_max_tickets")]
    pub max_tickets: usize,
    /// Top-N candidates retrieved per outer-loop ticket.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Precompute the reverse acceptance check at retrieval time.
    #[serde(default)]
    pub rev_precision: bool,
    /// When false, only explicit process() calls drive matching (tests).
    #[serde(default = "default_ticker_active")]
    pub ticker_active: bool,
    /// Signing key for relayed-match rendezvous tokens.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            interval_sec: default_interval_sec(),
            max_intervals: default_max_intervals(),
            max_tickets: default_max_tickets(),
            max_candidates: default_max_candidates(),
            rev_precision: false,
            ticker_active: default_ticker_active(),
            token_secret: default_token_secret(),
        }
    }
}

fn default_interval_sec() -> u64 {
    15
}

fn default_max_intervals() -> u32 {
    5
}

fn default_max_tickets() -> usize {
    3
}

fn default_max_candidates() -> usize {
    100
}

fn default_ticker_active() -> bool {
    true
}

fn default_token_secret() -> String {
    "rallypoint-insecure-dev-secret".to_string()
}
