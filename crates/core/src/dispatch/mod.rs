//! Result dispatch: envelopes, the external collaborator traits and the
//! relayed-match token.
//!
//! The dispatcher sits downstream of a committed match: by the time it
//! runs, the tickets are already gone from the store, so router and
//! registry failures are logged and absorbed rather than rolled back.

mod dispatcher;
mod token;
mod types;

pub use dispatcher::ResultDispatcher;
pub use token::TokenMinter;
pub use types::{
    DeciderError, MatchDecider, MatchDecision, MatchEntry, MatchEnvelope, MatchRegistry,
    MatchedUser, MessageRouter, RegistryError, RelayAllDecider, RouteError,
};
