//! Query string parser.

use super::types::{Clause, CompiledQuery, CompiledRegex, Expr, Occur, QueryError, RangeCmp};

/// Compile a query string into a [`CompiledQuery`].
///
/// Empty and syntactically invalid strings are rejected; callers surface
/// the error as an invalid-query failure.
pub fn parse_query(input: &str) -> Result<CompiledQuery, QueryError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Empty);
    }

    let mut clauses = Vec::new();
    for raw in split_clauses(trimmed)? {
        clauses.push(parse_clause(&raw)?);
    }

    Ok(CompiledQuery {
        clauses,
        source: input.to_string(),
    })
}

#[derive(PartialEq)]
enum LexState {
    Plain,
    Quoted,
    Regex,
}

/// Split the input on whitespace, keeping quoted phrases and `/…/` regex
/// bodies intact. Backslash escapes inside a regex body consume the next
/// character, so `\/` and `\-` pass through.
fn split_clauses(input: &str) -> Result<Vec<String>, QueryError> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut state = LexState::Plain;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            LexState::Plain => {
                if c.is_whitespace() {
                    if !buf.is_empty() {
                        out.push(std::mem::take(&mut buf));
                    }
                } else {
                    if c == '"' {
                        state = LexState::Quoted;
                    } else if c == '/' && buf.ends_with(':') {
                        state = LexState::Regex;
                    }
                    buf.push(c);
                }
            }
            LexState::Quoted => {
                buf.push(c);
                if c == '"' {
                    state = LexState::Plain;
                }
            }
            LexState::Regex => {
                buf.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        buf.push(escaped);
                    }
                } else if c == '/' {
                    state = LexState::Plain;
                }
            }
        }
    }

    if state != LexState::Plain {
        return Err(QueryError::InvalidClause {
            clause: buf,
            reason: "unterminated quote or regex".to_string(),
        });
    }
    if !buf.is_empty() {
        out.push(buf);
    }

    Ok(out)
}

fn parse_clause(raw: &str) -> Result<Clause, QueryError> {
    let (occur, body) = match raw.as_bytes().first() {
        Some(b'+') => (Occur::Must, &raw[1..]),
        Some(b'-') => (Occur::MustNot, &raw[1..]),
        _ => (Occur::Should, raw),
    };

    if body.is_empty() {
        return Err(QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: "empty clause".to_string(),
        });
    }

    // Match-all, with an optional boost suffix.
    if body == "*" || body.starts_with("*^") {
        let boost = parse_boost_suffix(raw, &body[1..])?;
        return Ok(Clause {
            occur,
            expr: Expr::All,
            boost,
        });
    }

    let colon = body.find(':').ok_or_else(|| QueryError::InvalidClause {
        clause: raw.to_string(),
        reason: "missing ':' separator".to_string(),
    })?;
    let field = &body[..colon];
    let value = &body[colon + 1..];

    if field.is_empty() {
        return Err(QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: "empty field name".to_string(),
        });
    }
    if value.is_empty() {
        return Err(QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: "empty value".to_string(),
        });
    }

    let (expr, boost) = if let Some(inner) = value.strip_prefix('"') {
        parse_phrase(raw, field, inner)?
    } else if value.starts_with('/') {
        parse_regex(raw, field, &value[1..])?
    } else if let Some((cmp, rest)) = split_range_operator(value) {
        parse_range(raw, field, cmp, rest)?
    } else {
        parse_term(raw, field, value)?
    };

    Ok(Clause { occur, expr, boost })
}

fn parse_phrase(raw: &str, field: &str, inner: &str) -> Result<(Expr, f64), QueryError> {
    let close = inner.find('"').ok_or_else(|| QueryError::InvalidClause {
        clause: raw.to_string(),
        reason: "unterminated phrase".to_string(),
    })?;
    let phrase = &inner[..close];
    let rest = &inner[close + 1..];
    let boost = parse_boost_suffix(raw, rest)?;

    let terms: Vec<String> = phrase
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if terms.is_empty() {
        return Err(QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: "empty phrase".to_string(),
        });
    }

    Ok((
        Expr::Phrase {
            field: field.to_string(),
            terms,
        },
        boost,
    ))
}

fn parse_regex(raw: &str, field: &str, inner: &str) -> Result<(Expr, f64), QueryError> {
    // Find the closing unescaped '/'.
    let mut close = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '/' {
            close = Some(i);
            break;
        }
    }
    let close = close.ok_or_else(|| QueryError::InvalidClause {
        clause: raw.to_string(),
        reason: "unterminated regex".to_string(),
    })?;

    let pattern = &inner[..close];
    let rest = &inner[close + 1..];
    let boost = parse_boost_suffix(raw, rest)?;

    let compiled = CompiledRegex::new(pattern).map_err(|e| QueryError::InvalidRegex {
        clause: raw.to_string(),
        reason: e.to_string(),
    })?;

    Ok((
        Expr::Regex {
            field: field.to_string(),
            pattern: compiled,
        },
        boost,
    ))
}

fn split_range_operator(value: &str) -> Option<(RangeCmp, &str)> {
    if let Some(rest) = value.strip_prefix(">=") {
        Some((RangeCmp::Ge, rest))
    } else if let Some(rest) = value.strip_prefix("<=") {
        Some((RangeCmp::Le, rest))
    } else if let Some(rest) = value.strip_prefix('>') {
        Some((RangeCmp::Gt, rest))
    } else if let Some(rest) = value.strip_prefix('<') {
        Some((RangeCmp::Lt, rest))
    } else {
        None
    }
}

fn parse_range(raw: &str, field: &str, cmp: RangeCmp, rest: &str) -> Result<(Expr, f64), QueryError> {
    let (number, boost) = split_value_boost(raw, rest)?;
    let value: f64 = number.parse().map_err(|_| QueryError::InvalidNumber {
        clause: raw.to_string(),
        value: number.to_string(),
    })?;
    if !value.is_finite() {
        return Err(QueryError::InvalidNumber {
            clause: raw.to_string(),
            value: number.to_string(),
        });
    }

    Ok((
        Expr::Range {
            field: field.to_string(),
            cmp,
            value,
        },
        boost,
    ))
}

fn parse_term(raw: &str, field: &str, value: &str) -> Result<(Expr, f64), QueryError> {
    let (term, boost) = split_value_boost(raw, value)?;
    if term.is_empty() {
        return Err(QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: "empty value".to_string(),
        });
    }

    Ok((
        Expr::Term {
            field: field.to_string(),
            value: term.to_lowercase(),
        },
        boost,
    ))
}

/// Split a bare value into (value, boost) at the last `^`.
fn split_value_boost<'a>(raw: &str, value: &'a str) -> Result<(&'a str, f64), QueryError> {
    match value.rfind('^') {
        Some(pos) => {
            let boost = parse_boost_suffix(raw, &value[pos..])?;
            Ok((&value[..pos], boost))
        }
        None => Ok((value, 1.0)),
    }
}

/// Parse the trailing text after a clause value: empty means boost 1.0,
/// otherwise it must be `^<positive number>`.
fn parse_boost_suffix(raw: &str, rest: &str) -> Result<f64, QueryError> {
    if rest.is_empty() {
        return Ok(1.0);
    }
    let digits = rest
        .strip_prefix('^')
        .ok_or_else(|| QueryError::InvalidClause {
            clause: raw.to_string(),
            reason: format!("unexpected trailing {:?}", rest),
        })?;
    let boost: f64 = digits.parse().map_err(|_| QueryError::InvalidBoost {
        clause: raw.to_string(),
        value: digits.to_string(),
    })?;
    if !boost.is_finite() || boost <= 0.0 {
        return Err(QueryError::InvalidBoost {
            clause: raw.to_string(),
            value: digits.to_string(),
        });
    }
    Ok(boost)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Clause {
        let q = parse_query(input).unwrap();
        assert_eq!(q.clauses.len(), 1, "expected one clause in {:?}", input);
        q.clauses.into_iter().next().unwrap()
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(matches!(parse_query(""), Err(QueryError::Empty)));
        assert!(matches!(parse_query("   "), Err(QueryError::Empty)));
    }

    #[test]
    fn test_match_all() {
        let c = single("*");
        assert_eq!(c.expr, Expr::All);
        assert_eq!(c.occur, Occur::Should);
        assert_eq!(c.boost, 1.0);
    }

    #[test]
    fn test_term_clause() {
        let c = single("+properties.mode:coop");
        assert_eq!(c.occur, Occur::Must);
        assert_eq!(
            c.expr,
            Expr::Term {
                field: "properties.mode".to_string(),
                value: "coop".to_string(),
            }
        );
    }

    #[test]
    fn test_term_lowercased() {
        let c = single("properties.region:EU-West");
        assert_eq!(
            c.expr,
            Expr::Term {
                field: "properties.region".to_string(),
                value: "eu-west".to_string(),
            }
        );
    }

    #[test]
    fn test_prohibited_clause() {
        let c = single("-properties.mode:ranked");
        assert_eq!(c.occur, Occur::MustNot);
    }

    #[test]
    fn test_phrase_clause() {
        let c = single("properties.map:\"dust two\"");
        assert_eq!(
            c.expr,
            Expr::Phrase {
                field: "properties.map".to_string(),
                terms: vec!["dust".to_string(), "two".to_string()],
            }
        );
    }

    #[test]
    fn test_phrase_with_boost() {
        let c = single("properties.map:\"dust two\"^3");
        assert_eq!(c.boost, 3.0);
    }

    #[test]
    fn test_range_clauses() {
        let c = single("+properties.skill:>=10");
        assert_eq!(
            c.expr,
            Expr::Range {
                field: "properties.skill".to_string(),
                cmp: RangeCmp::Ge,
                value: 10.0,
            }
        );

        let c = single("properties.skill:<2.5");
        assert_eq!(
            c.expr,
            Expr::Range {
                field: "properties.skill".to_string(),
                cmp: RangeCmp::Lt,
                value: 2.5,
            }
        );
    }

    #[test]
    fn test_range_with_boost() {
        let c = single("properties.skill:>=10^2");
        assert_eq!(c.boost, 2.0);
        assert_eq!(
            c.expr,
            Expr::Range {
                field: "properties.skill".to_string(),
                cmp: RangeCmp::Ge,
                value: 10.0,
            }
        );
    }

    #[test]
    fn test_regex_clause() {
        let c = single("-properties.blocked:/.*uuid\\-1.*/");
        assert_eq!(c.occur, Occur::MustNot);
        match c.expr {
            Expr::Regex { ref field, ref pattern } => {
                assert_eq!(field, "properties.blocked");
                assert!(pattern.is_match("xx uuid-1 yy".split_whitespace().nth(1).unwrap()));
            }
            other => panic!("expected regex clause, got {:?}", other),
        }
    }

    #[test]
    fn test_regex_with_escaped_slash() {
        let c = single("properties.path:/a\\/b/");
        match c.expr {
            Expr::Regex { ref pattern, .. } => assert!(pattern.is_match("a/b")),
            other => panic!("expected regex clause, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_clause_query() {
        let q = parse_query("+properties.mode:coop properties.region:eu^2 -properties.blocked:/x.*/").unwrap();
        assert_eq!(q.clauses.len(), 3);
        assert_eq!(q.clauses[0].occur, Occur::Must);
        assert_eq!(q.clauses[1].boost, 2.0);
        assert_eq!(q.clauses[2].occur, Occur::MustNot);
    }

    #[test]
    fn test_phrase_keeps_internal_whitespace_split() {
        let q = parse_query("+properties.a:\"x y\" +properties.b:z").unwrap();
        assert_eq!(q.clauses.len(), 2);
    }

    #[test]
    fn test_invalid_clauses() {
        assert!(matches!(
            parse_query("noseparator"),
            Err(QueryError::InvalidClause { .. })
        ));
        assert!(matches!(
            parse_query(":value"),
            Err(QueryError::InvalidClause { .. })
        ));
        assert!(matches!(
            parse_query("field:"),
            Err(QueryError::InvalidClause { .. })
        ));
        assert!(matches!(
            parse_query("field:\"unterminated"),
            Err(QueryError::InvalidClause { .. })
        ));
        assert!(matches!(
            parse_query("field:/unterminated"),
            Err(QueryError::InvalidClause { .. })
        ));
    }

    #[test]
    fn test_invalid_numbers_and_boosts() {
        assert!(matches!(
            parse_query("field:>=abc"),
            Err(QueryError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_query("field:value^zero"),
            Err(QueryError::InvalidBoost { .. })
        ));
        assert!(matches!(
            parse_query("field:value^-1"),
            Err(QueryError::InvalidBoost { .. })
        ));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(matches!(
            parse_query("field:/(unclosed/"),
            Err(QueryError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_source_preserved() {
        let q = parse_query("+properties.mode:coop").unwrap();
        assert_eq!(q.source, "+properties.mode:coop");
    }
}
