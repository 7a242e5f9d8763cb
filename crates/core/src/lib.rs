// Allow some clippy lints that are too noisy for this codebase
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_borrow)]
#![allow(clippy::collapsible_if)]

pub mod config;
pub mod dispatch;
pub mod index;
pub mod matcher;
pub mod matchmaker;
pub mod metrics;
pub mod query;
pub mod ticket;

/// Testing utilities and mock implementations for E2E tests.
///
/// This module provides mock implementations of the external collaborator
/// traits (router, registry, decider), allowing comprehensive matchmaking
/// tests without real infrastructure.
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, MatchmakerConfig,
};
pub use dispatch::{
    DeciderError, MatchDecider, MatchDecision, MatchEntry, MatchEnvelope, MatchRegistry,
    MatchedUser, MessageRouter, RegistryError, RelayAllDecider, ResultDispatcher, RouteError,
    TokenMinter,
};
pub use index::{Document, IndexReader, ScoredDoc, TicketIndex};
pub use matcher::Matcher;
pub use matchmaker::{Matchmaker, MatchmakerStatus};
pub use query::{parse_query, Clause, CompiledQuery, CompiledRegex, Expr, Occur, QueryError, RangeCmp};
pub use ticket::{
    AddError, AddTicket, Presence, RemoveError, StoreStats, Ticket, TicketStore,
};
