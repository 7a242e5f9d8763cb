//! Matchmaking query language.
//!
//! Compiles a client-supplied query string into a searchable AST and
//! evaluates it against indexed ticket documents. The same evaluator backs
//! the index-side top-N search and the document-side mutual check, so the
//! two can never disagree on acceptance.
//!
//! Grammar: whitespace-separated clauses; prefix `+` required, `-`
//! prohibited; suffix `^n` boost; clause forms `field:value`,
//! `field:"a b"`, `field:>=n` (and `<=`, `>`, `<`), `field:/regex/`, `*`.
//! Text matching is case-insensitive on whitespace tokens; regex clauses
//! are anchored to the full token.

mod evaluator;
mod parser;
mod types;

pub use parser::parse_query;
pub use types::{Clause, CompiledQuery, CompiledRegex, Expr, Occur, QueryError, RangeCmp};
