//! The inverted index proper: write path, snapshot readers, top-N search.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use crate::query::{CompiledQuery, Expr, Occur, RangeCmp};

use super::document::Document;

/// One scored hit from a top-N search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
struct IndexInner {
    docs: HashMap<String, Arc<Document>>,
    /// field -> lowercased token -> doc ids.
    text: HashMap<String, HashMap<String, BTreeSet<String>>>,
    /// field -> sortable-encoded value -> doc ids.
    numeric: HashMap<String, BTreeMap<u64, BTreeSet<String>>>,
}

/// Map a finite double to a u64 that sorts the same way.
///
/// Sign-flip encoding: positive values get the sign bit set, negative
/// values are bit-inverted, so unsigned order equals numeric order.
fn sortable_f64(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Write handle over the index. Mutations take the exclusive lock;
/// [`TicketIndex::reader`] snapshots the current state so search never
/// blocks subsequent writes.
#[derive(Debug, Default)]
pub struct TicketIndex {
    inner: RwLock<IndexInner>,
}

impl TicketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document under `doc_id`. Idempotent: an existing document
    /// with the same id is replaced.
    pub fn insert(&self, doc_id: &str, doc: Document) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        remove_inner(&mut inner, doc_id);

        for (field, values) in doc.text_fields() {
            let postings = inner.text.entry(field.to_string()).or_default();
            for value in values {
                for token in value.split_whitespace() {
                    postings
                        .entry(token.to_lowercase())
                        .or_default()
                        .insert(doc_id.to_string());
                }
            }
        }
        for (field, value) in doc.numeric_fields() {
            inner
                .numeric
                .entry(field.to_string())
                .or_default()
                .entry(sortable_f64(value))
                .or_default()
                .insert(doc_id.to_string());
        }
        inner.docs.insert(doc_id.to_string(), Arc::new(doc));
    }

    /// Delete a document. Returns whether it existed.
    pub fn remove(&self, doc_id: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        remove_inner(&mut inner, doc_id)
    }

    /// Point-in-time snapshot of the index.
    pub fn reader(&self) -> IndexReader {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        IndexReader {
            inner: Arc::new(inner.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .docs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .docs
            .contains_key(doc_id)
    }
}

fn remove_inner(inner: &mut IndexInner, doc_id: &str) -> bool {
    let Some(doc) = inner.docs.remove(doc_id) else {
        return false;
    };

    for (field, values) in doc.text_fields() {
        if let Some(postings) = inner.text.get_mut(field) {
            for value in values {
                for token in value.split_whitespace() {
                    let token = token.to_lowercase();
                    if let Some(ids) = postings.get_mut(&token) {
                        ids.remove(doc_id);
                        if ids.is_empty() {
                            postings.remove(&token);
                        }
                    }
                }
            }
            if postings.is_empty() {
                inner.text.remove(field);
            }
        }
    }
    for (field, value) in doc.numeric_fields() {
        let key = sortable_f64(value);
        if let Some(tree) = inner.numeric.get_mut(field) {
            if let Some(ids) = tree.get_mut(&key) {
                ids.remove(doc_id);
                if ids.is_empty() {
                    tree.remove(&key);
                }
            }
            if tree.is_empty() {
                inner.numeric.remove(field);
            }
        }
    }
    true
}

/// Immutable point-in-time view of the index.
#[derive(Debug, Clone)]
pub struct IndexReader {
    inner: Arc<IndexInner>,
}

impl IndexReader {
    pub fn len(&self) -> usize {
        self.inner.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.docs.is_empty()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.inner.docs.contains_key(doc_id)
    }

    /// The stored document for `doc_id`.
    pub fn get(&self, doc_id: &str) -> Option<Arc<Document>> {
        self.inner.docs.get(doc_id).cloned()
    }

    /// Top-N scored search.
    ///
    /// The candidate set is narrowed through the postings of `+` clauses
    /// where possible; every candidate is then accepted or rejected by the
    /// shared query evaluator, so the result set is exactly the documents
    /// `query.matches` accepts. Ties are broken by doc id for determinism.
    pub fn search(&self, query: &CompiledQuery, limit: usize) -> Vec<ScoredDoc> {
        if limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<ScoredDoc> = match self.narrow(query) {
            Some(candidates) => candidates
                .into_iter()
                .filter_map(|doc_id| self.score_one(query, doc_id))
                .collect(),
            None => self
                .inner
                .docs
                .keys()
                .filter_map(|doc_id| self.score_one(query, doc_id.clone()))
                .collect(),
        };

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(limit);
        hits
    }

    fn score_one(&self, query: &CompiledQuery, doc_id: String) -> Option<ScoredDoc> {
        let doc = self.inner.docs.get(&doc_id)?;
        query.score(doc).map(|score| ScoredDoc { doc_id, score })
    }

    /// Intersect the posting sets of narrowable `+` clauses. `None` means
    /// no narrowing clause exists and the full doc set must be scanned.
    fn narrow(&self, query: &CompiledQuery) -> Option<HashSet<String>> {
        let mut narrowed: Option<HashSet<String>> = None;

        for clause in &query.clauses {
            if clause.occur != Occur::Must {
                continue;
            }
            let clause_set = match &clause.expr {
                Expr::Term { field, value } => Some(self.term_postings(field, value)),
                Expr::Phrase { field, terms } => {
                    // Superset: every phrase token must be present somewhere
                    // in the field; ordering is re-checked by the evaluator.
                    let mut set: Option<HashSet<String>> = None;
                    for term in terms {
                        let postings = self.term_postings(field, term);
                        set = Some(match set {
                            Some(acc) => acc.intersection(&postings).cloned().collect(),
                            None => postings,
                        });
                    }
                    set
                }
                Expr::Range { field, cmp, value } => Some(self.range_postings(field, *cmp, *value)),
                Expr::All | Expr::Regex { .. } => None,
            };

            if let Some(set) = clause_set {
                narrowed = Some(match narrowed {
                    Some(acc) => acc.intersection(&set).cloned().collect(),
                    None => set,
                });
                if narrowed.as_ref().is_some_and(|s| s.is_empty()) {
                    return narrowed;
                }
            }
        }

        narrowed
    }

    fn term_postings(&self, field: &str, token: &str) -> HashSet<String> {
        self.inner
            .text
            .get(field)
            .and_then(|postings| postings.get(token))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn range_postings(&self, field: &str, cmp: RangeCmp, value: f64) -> HashSet<String> {
        let Some(tree) = self.inner.numeric.get(field) else {
            return HashSet::new();
        };
        let key = sortable_f64(value);
        let (lower, upper) = match cmp {
            RangeCmp::Ge => (Bound::Included(key), Bound::Unbounded),
            RangeCmp::Gt => (Bound::Excluded(key), Bound::Unbounded),
            RangeCmp::Le => (Bound::Unbounded, Bound::Included(key)),
            RangeCmp::Lt => (Bound::Unbounded, Bound::Excluded(key)),
        };
        tree.range((lower, upper))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }
}
