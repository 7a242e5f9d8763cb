//! The per-round matching algorithm.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dispatch::{MatchDecider, MatchDecision, MatchEntry, ResultDispatcher};
use crate::index::{Document, IndexReader, TicketIndex, FIELD_MAX_COUNT, FIELD_MIN_COUNT};
use crate::metrics;
use crate::query::{Clause, CompiledQuery, Expr, Occur, RangeCmp};
use crate::ticket::{Ticket, TicketStore};

use super::groups::{assemble_groups, Candidate};

/// The matching engine. One `process` call runs one full round; the owner
/// (ticker or test driver) serializes calls.
#[derive(Clone)]
pub struct Matcher {
    store: Arc<TicketStore>,
    index: Arc<TicketIndex>,
    decider: Arc<dyn MatchDecider>,
    dispatcher: Arc<ResultDispatcher>,
    max_intervals: u32,
    max_candidates: usize,
    rev_precision: bool,
    round_deadline: Duration,
}

impl Matcher {
    pub fn new(
        store: Arc<TicketStore>,
        index: Arc<TicketIndex>,
        decider: Arc<dyn MatchDecider>,
        dispatcher: Arc<ResultDispatcher>,
        max_intervals: u32,
        max_candidates: usize,
        rev_precision: bool,
        round_deadline: Duration,
    ) -> Self {
        Self {
            store,
            index,
            decider,
            dispatcher,
            max_intervals,
            max_candidates,
            rev_precision,
            round_deadline,
        }
    }

    /// Run one matching round.
    ///
    /// Internal errors are absorbed: collaborator failures reject the
    /// affected group and the round carries on. Nothing here may take the
    /// matchmaker down.
    pub async fn process(&self) {
        let started = Instant::now();
        let deadline = started + self.round_deadline;

        let (mut active, expired) = self.store.advance_intervals(self.max_intervals).await;
        // Longest-waiting tickets drive the round; ties break on ticket id
        // so the order is deterministic.
        active.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.ticket_id.cmp(&b.ticket_id))
        });

        let reader = self.index.reader();
        let mut used_sessions: HashSet<String> = HashSet::new();
        let mut consumed: HashSet<String> = HashSet::new();
        // Pairwise acceptance memo for this round: (who, whom) -> accepted.
        let mut pair_cache: HashMap<(String, String), bool> = HashMap::new();
        let mut matched_groups = 0usize;

        for anchor in &active {
            if Instant::now() >= deadline {
                debug!("round deadline reached, committing partial results");
                break;
            }
            if consumed.contains(&anchor.ticket_id) {
                continue;
            }
            if overlaps(&anchor.session_ids, &used_sessions) {
                continue;
            }

            let anchor_doc = anchor.document();
            let candidates = self
                .retrieve(&reader, anchor, &anchor_doc, &consumed, &used_sessions, &mut pair_cache)
                .await;
            metrics::CANDIDATES_RETRIEVED.observe(candidates.len() as f64);

            let proposals = assemble_groups(anchor, &candidates);
            for proposal in proposals {
                let group: Vec<&Ticket> = std::iter::once(anchor)
                    .chain(proposal.members.iter().map(|&i| &candidates[i].ticket))
                    .collect();

                if !verify_mutual(&group, &anchor_doc, &reader, &mut pair_cache) {
                    metrics::GROUPS_REJECTED.with_label_values(&["mutual"]).inc();
                    continue;
                }

                let entries: Vec<MatchEntry> = group.iter().map(|t| MatchEntry::from(*t)).collect();
                let decision = match self.decider.evaluate(&entries).await {
                    Ok(MatchDecision::Reject) => {
                        metrics::GROUPS_REJECTED.with_label_values(&["decider"]).inc();
                        continue;
                    }
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!("match decider failed, rejecting group: {}", e);
                        metrics::GROUPS_REJECTED.with_label_values(&["decider"]).inc();
                        continue;
                    }
                };

                let ticket_ids: Vec<String> = group.iter().map(|t| t.ticket_id.clone()).collect();
                let Some(removed) = self.store.commit_group(&ticket_ids).await else {
                    // A member was removed concurrently; the group is
                    // discarded silently.
                    metrics::GROUPS_REJECTED.with_label_values(&["vanished"]).inc();
                    continue;
                };

                for ticket in &removed {
                    used_sessions.extend(ticket.session_ids.iter().cloned());
                    consumed.insert(ticket.ticket_id.clone());
                }
                metrics::TICKETS_REMOVED
                    .with_label_values(&["matched"])
                    .inc_by(removed.len() as u64);
                matched_groups += 1;

                debug!(
                    anchor = %anchor.ticket_id,
                    size = proposal.total_count,
                    tickets = removed.len(),
                    "match group committed"
                );
                self.dispatcher.dispatch_matched(&entries, &decision).await;
                break;
            }
        }

        for ticket in &expired {
            metrics::TICKETS_REMOVED.with_label_values(&["expired"]).inc();
            self.dispatcher.dispatch_expired(&MatchEntry::from(ticket)).await;
        }

        metrics::PROCESS_ROUNDS.inc();
        metrics::PROCESS_DURATION.observe(started.elapsed().as_secs_f64());
        metrics::TICKETS_ACTIVE.set(self.store.len().await as i64);

        if matched_groups > 0 || !expired.is_empty() {
            info!(
                matched_groups,
                expired = expired.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "matcher round done"
            );
        }
    }

    /// Top-N retrieval for one outer-loop ticket: the ticket's own query
    /// plus the count-window conjuncts, minus itself, session-mates and
    /// anything already claimed this round.
    async fn retrieve(
        &self,
        reader: &IndexReader,
        anchor: &Ticket,
        anchor_doc: &Document,
        consumed: &HashSet<String>,
        used_sessions: &HashSet<String>,
        pair_cache: &mut HashMap<(String, String), bool>,
    ) -> Vec<Candidate> {
        let composite = composite_query(anchor);
        let hits = reader.search(&composite, self.max_candidates);

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.doc_id == anchor.ticket_id || consumed.contains(&hit.doc_id) {
                continue;
            }
            // Resolve against the live store; index snapshots may lag a
            // concurrent removal.
            let Some(ticket) = self.store.get(&hit.doc_id).await else {
                continue;
            };
            if ticket.shares_session_with(anchor) {
                continue;
            }
            if overlaps(&ticket.session_ids, used_sessions) {
                continue;
            }
            if self.rev_precision {
                let accepts = ticket.query.matches(anchor_doc);
                pair_cache.insert(
                    (ticket.ticket_id.clone(), anchor.ticket_id.clone()),
                    accepts,
                );
                if !accepts {
                    continue;
                }
            }
            candidates.push(Candidate {
                ticket,
                score: hit.score,
            });
        }
        candidates
    }
}

/// The anchor's query AND the index-expressible count window: candidates
/// must accept a group this small (`min_count <= anchor.max_count`) and
/// this large (`max_count >= anchor.min_count`). Exact totals and
/// multiples are enforced during assembly.
fn composite_query(anchor: &Ticket) -> CompiledQuery {
    let mut clauses = anchor.query.clauses.clone();
    clauses.push(Clause {
        occur: Occur::Must,
        expr: Expr::Range {
            field: FIELD_MIN_COUNT.to_string(),
            cmp: RangeCmp::Le,
            value: anchor.max_count as f64,
        },
        boost: 1.0,
    });
    clauses.push(Clause {
        occur: Occur::Must,
        expr: Expr::Range {
            field: FIELD_MAX_COUNT.to_string(),
            cmp: RangeCmp::Ge,
            value: anchor.min_count as f64,
        },
        boost: 1.0,
    });
    CompiledQuery {
        source: format!(
            "{} +{}:<={} +{}:>={}",
            anchor.query.source, FIELD_MIN_COUNT, anchor.max_count, FIELD_MAX_COUNT, anchor.min_count
        ),
        clauses,
    }
}

/// Mutual verification: every member's query must accept every other
/// member's document. Pairwise verdicts are memoized across the round.
fn verify_mutual(
    group: &[&Ticket],
    anchor_doc: &Document,
    reader: &IndexReader,
    pair_cache: &mut HashMap<(String, String), bool>,
) -> bool {
    // Documents per member; the anchor (index 0) may not be in the reader
    // snapshot, so its document comes in prebuilt.
    let docs: Vec<Arc<Document>> = group
        .iter()
        .enumerate()
        .map(|(i, ticket)| {
            if i == 0 {
                Arc::new(anchor_doc.clone())
            } else {
                reader
                    .get(&ticket.ticket_id)
                    .unwrap_or_else(|| Arc::new(ticket.document()))
            }
        })
        .collect();

    for (i, who) in group.iter().enumerate() {
        for (j, whom) in group.iter().enumerate() {
            if i == j {
                continue;
            }
            let key = (who.ticket_id.clone(), whom.ticket_id.clone());
            let accepted = match pair_cache.get(&key) {
                Some(&verdict) => verdict,
                None => {
                    let verdict = who.query.matches(&docs[j]);
                    pair_cache.insert(key, verdict);
                    verdict
                }
            };
            if !accepted {
                return false;
            }
        }
    }
    true
}

fn overlaps(sessions: &HashSet<String>, used: &HashSet<String>) -> bool {
    sessions.iter().any(|s| used.contains(s))
}
