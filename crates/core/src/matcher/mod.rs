//! The mutual-match engine.
//!
//! Scans active tickets each round, retrieves candidates from the index,
//! assembles count-compatible groups, verifies that every member's query
//! accepts every other member, consults the injected decision capability
//! and commits accepted groups to the dispatcher.

mod engine;
mod groups;

pub use engine::Matcher;
