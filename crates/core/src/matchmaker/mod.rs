//! The matchmaker facade: public API surface plus the interval ticker.
//!
//! A [`Matchmaker`] is a constructible value owning its store, index,
//! matcher and ticker; multiple independent instances can coexist (tests
//! rely on this). External collaborators are injected: the message router,
//! the match registry and optionally the match-decision capability.

mod runner;
mod types;

pub use runner::Matchmaker;
pub use types::MatchmakerStatus;
