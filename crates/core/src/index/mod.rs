//! In-memory inverted text/numeric index over ticket documents.
//!
//! Write-optimized and snapshot-readable: writers mutate the live tables
//! under an exclusive lock, readers take a point-in-time snapshot and are
//! never blocked by later writes. Supports top-N scored search with the
//! shared query evaluator.

mod document;
mod inverted;

pub use document::{
    Document, FIELD_CREATED_AT, FIELD_MAX_COUNT, FIELD_MIN_COUNT, FIELD_PARTY_ID,
    FIELD_SESSION_IDS, PROPERTY_PREFIX,
};
pub use inverted::{IndexReader, ScoredDoc, TicketIndex};
