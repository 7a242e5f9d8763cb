//! Query AST types.

use std::sync::Arc;

use regex_lite::Regex;
use thiserror::Error;

/// Errors produced while compiling a query string.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query string was empty or all whitespace.
    #[error("empty query")]
    Empty,

    /// A clause could not be parsed.
    #[error("invalid clause {clause:?}: {reason}")]
    InvalidClause { clause: String, reason: String },

    /// A range endpoint was not a finite number.
    #[error("invalid number {value:?} in clause {clause:?}")]
    InvalidNumber { clause: String, value: String },

    /// A regex clause failed to compile.
    #[error("invalid regex in clause {clause:?}: {reason}")]
    InvalidRegex { clause: String, reason: String },

    /// A boost suffix was not a positive number.
    #[error("invalid boost {value:?} in clause {clause:?}")]
    InvalidBoost { clause: String, value: String },
}

/// How a clause participates in the boolean match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// Bare clause: optional, contributes to the score.
    Should,
    /// `+` prefix: the document must match.
    Must,
    /// `-` prefix: the document must not match.
    MustNot,
}

/// Comparison operator of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCmp {
    Ge,
    Gt,
    Le,
    Lt,
}

/// A regex compiled with implicit full anchoring.
///
/// The original pattern is kept for equality and diagnostics; the compiled
/// form is wrapped as `^(?:pattern)$` so a match always covers the whole
/// token.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    source: String,
    regex: Arc<Regex>,
}

impl CompiledRegex {
    /// Compile `pattern` with full anchoring.
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex: Arc::new(regex),
        })
    }

    /// The pattern as written in the query, without the added anchors.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test a single token against the anchored pattern.
    pub fn is_match(&self, token: &str) -> bool {
        self.regex.is_match(token)
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A single clause expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `*` — matches every document.
    All,
    /// `field:value` — exact token match on a text field.
    Term { field: String, value: String },
    /// `field:"a b"` — ordered tokens within one field value.
    Phrase { field: String, terms: Vec<String> },
    /// `field:>=n` and friends — numeric comparison.
    Range {
        field: String,
        cmp: RangeCmp,
        value: f64,
    },
    /// `field:/pattern/` — anchored regex over field tokens.
    Regex { field: String, pattern: CompiledRegex },
}

/// One parsed clause: occurrence marker, expression and boost.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub expr: Expr,
    pub boost: f64,
}

/// A fully compiled query: the clause list plus the original source string.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub clauses: Vec<Clause>,
    pub source: String,
}
