//! Query evaluation against indexed documents.
//!
//! Both the index-side top-N search and the document-side mutual check run
//! through [`CompiledQuery::score`], so acceptance can never diverge
//! between the two paths.

use crate::index::Document;

use super::types::{CompiledQuery, Expr, Occur, RangeCmp};

impl CompiledQuery {
    /// Boolean acceptance: does this query accept the document?
    pub fn matches(&self, doc: &Document) -> bool {
        self.score(doc).is_some()
    }

    /// Relevance score, or `None` when the document does not match.
    ///
    /// Semantics follow the usual boolean-query rules: every `+` clause
    /// must match, no `-` clause may match, and when the query has bare
    /// clauses but no `+` clauses at least one bare clause must match.
    /// The score is the boost sum of the matching non-prohibited clauses;
    /// a query with no scoring clause (pure `-`) scores 1.0.
    pub fn score(&self, doc: &Document) -> Option<f64> {
        let mut score = 0.0;
        let mut has_positive = false;
        let mut has_must = false;
        let mut any_should_matched = false;
        let mut has_should = false;

        for clause in &self.clauses {
            let hit = clause.expr.matches_doc(doc);
            match clause.occur {
                Occur::Must => {
                    has_must = true;
                    has_positive = true;
                    if !hit {
                        return None;
                    }
                    score += clause.boost;
                }
                Occur::MustNot => {
                    if hit {
                        return None;
                    }
                }
                Occur::Should => {
                    has_should = true;
                    has_positive = true;
                    if hit {
                        any_should_matched = true;
                        score += clause.boost;
                    }
                }
            }
        }

        if has_should && !has_must && !any_should_matched {
            return None;
        }
        if !has_positive || score == 0.0 {
            score = 1.0;
        }

        Some(score)
    }
}

impl Expr {
    /// Evaluate one expression against a document.
    pub(crate) fn matches_doc(&self, doc: &Document) -> bool {
        match self {
            Expr::All => true,
            Expr::Term { field, value } => doc.tokens(field).iter().any(|t| t == value),
            Expr::Phrase { field, terms } => match doc.text_values(field) {
                Some(values) => values.iter().any(|v| phrase_in_value(v, terms)),
                None => false,
            },
            Expr::Range { field, cmp, value } => match doc.numeric(field) {
                Some(n) => match cmp {
                    RangeCmp::Ge => n >= *value,
                    RangeCmp::Gt => n > *value,
                    RangeCmp::Le => n <= *value,
                    RangeCmp::Lt => n < *value,
                },
                None => false,
            },
            Expr::Regex { field, pattern } => match doc.text_values(field) {
                Some(values) => values
                    .iter()
                    .flat_map(|v| v.split_whitespace())
                    .any(|token| pattern.is_match(token)),
                None => false,
            },
        }
    }
}

/// True when the phrase tokens appear consecutively in one value's
/// whitespace tokenization.
fn phrase_in_value(value: &str, terms: &[String]) -> bool {
    let tokens: Vec<String> = value.split_whitespace().map(|t| t.to_lowercase()).collect();
    if terms.is_empty() || tokens.len() < terms.len() {
        return false;
    }
    tokens
        .windows(terms.len())
        .any(|window| window.iter().zip(terms).all(|(a, b)| a == b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    fn doc(pairs: &[(&str, &str)], nums: &[(&str, f64)]) -> Document {
        let mut d = Document::new();
        for (k, v) in pairs {
            d.push_text(*k, *v);
        }
        for (k, v) in nums {
            d.set_numeric(*k, *v);
        }
        d
    }

    #[test]
    fn test_term_match() {
        let d = doc(&[("properties.mode", "coop")], &[]);
        assert!(parse_query("+properties.mode:coop").unwrap().matches(&d));
        assert!(!parse_query("+properties.mode:ranked").unwrap().matches(&d));
    }

    #[test]
    fn test_term_match_is_case_insensitive() {
        let d = doc(&[("properties.mode", "Coop")], &[]);
        assert!(parse_query("+properties.mode:COOP").unwrap().matches(&d));
    }

    #[test]
    fn test_term_matches_any_token() {
        let d = doc(&[("properties.tags", "casual coop weekend")], &[]);
        assert!(parse_query("+properties.tags:coop").unwrap().matches(&d));
        assert!(!parse_query("+properties.tags:ranked").unwrap().matches(&d));
    }

    #[test]
    fn test_phrase_requires_order() {
        let d = doc(&[("properties.map", "dust two remake")], &[]);
        assert!(parse_query("properties.map:\"dust two\"").unwrap().matches(&d));
        assert!(!parse_query("properties.map:\"two dust\"").unwrap().matches(&d));
    }

    #[test]
    fn test_range_inclusive_and_strict() {
        let d = doc(&[], &[("properties.skill", 10.0)]);
        assert!(parse_query("+properties.skill:>=10").unwrap().matches(&d));
        assert!(!parse_query("+properties.skill:>10").unwrap().matches(&d));
        assert!(parse_query("+properties.skill:<=10").unwrap().matches(&d));
        assert!(!parse_query("+properties.skill:<10").unwrap().matches(&d));
    }

    #[test]
    fn test_range_missing_field_never_matches() {
        let d = doc(&[("properties.mode", "coop")], &[]);
        assert!(!parse_query("+properties.skill:>=0").unwrap().matches(&d));
    }

    #[test]
    fn test_regex_tests_each_token() {
        let d = doc(&[("properties.blocked", "uuid-x uuid-y uuid-z")], &[]);
        // One of the tokens matches the anchored pattern.
        assert!(parse_query("+properties.blocked:/.*uuid\\-y.*/").unwrap().matches(&d));
        // No token contains uuid-q.
        assert!(!parse_query("+properties.blocked:/.*uuid\\-q.*/").unwrap().matches(&d));
    }

    #[test]
    fn test_prohibited_regex_excludes() {
        let d = doc(&[("properties.blocked", "uuid-x uuid-y")], &[]);
        assert!(!parse_query("-properties.blocked:/.*uuid\\-y.*/").unwrap().matches(&d));
        assert!(parse_query("-properties.blocked:/.*uuid\\-q.*/").unwrap().matches(&d));
    }

    #[test]
    fn test_match_all() {
        let d = doc(&[], &[]);
        assert!(parse_query("*").unwrap().matches(&d));
    }

    #[test]
    fn test_should_clauses_require_one_hit() {
        let d = doc(&[("properties.mode", "coop")], &[]);
        assert!(parse_query("properties.mode:coop properties.mode:ranked")
            .unwrap()
            .matches(&d));
        assert!(!parse_query("properties.mode:ranked properties.mode:pvp")
            .unwrap()
            .matches(&d));
    }

    #[test]
    fn test_should_optional_when_must_present() {
        let d = doc(&[("properties.mode", "coop")], &[]);
        let q = parse_query("+properties.mode:coop properties.region:eu").unwrap();
        assert!(q.matches(&d));
    }

    #[test]
    fn test_boost_raises_score() {
        let d = doc(&[("properties.mode", "coop"), ("properties.region", "eu")], &[]);
        let plain = parse_query("properties.mode:coop properties.region:eu").unwrap();
        let boosted = parse_query("properties.mode:coop^5 properties.region:eu").unwrap();
        assert!(boosted.score(&d).unwrap() > plain.score(&d).unwrap());
    }

    #[test]
    fn test_pure_prohibited_query_scores_one() {
        let d = doc(&[("properties.mode", "coop")], &[]);
        let q = parse_query("-properties.mode:ranked").unwrap();
        assert_eq!(q.score(&d), Some(1.0));
    }

    #[test]
    fn test_must_score_is_boost_sum() {
        let d = doc(&[("properties.mode", "coop")], &[("properties.skill", 5.0)]);
        let q = parse_query("+properties.mode:coop^2 +properties.skill:>=1^3").unwrap();
        assert_eq!(q.score(&d), Some(5.0));
    }
}
