//! Count-compatible group assembly.

use crate::ticket::Ticket;

/// Hard cap on DFS nodes visited per outer-loop ticket. Keeps the subset
/// enumeration bounded when many candidates have overlapping count ranges.
const GROUP_SEARCH_LIMIT: usize = 4096;

/// A retrieved candidate with its index score.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub ticket: Ticket,
    pub score: f64,
}

/// A viable group: indexes into the candidate slice plus preference keys.
/// The anchor ticket is an implicit member of every proposal.
#[derive(Debug)]
pub(crate) struct GroupProposal {
    pub members: Vec<usize>,
    pub total_count: usize,
    pub score_sum: f64,
    pub created_avg: f64,
}

/// Enumerate subsets of `candidates` that, combined with `anchor`, sum to
/// a total presence count allowed by every member.
///
/// Candidates are visited in score order (the retrieval order), the depth
/// is bounded by the remaining capacity and the whole search by
/// [`GROUP_SEARCH_LIMIT`]. Proposals come back preferred by total count
/// descending (full groups first), then score sum, then lowest average
/// wait (created_at ascending).
pub(crate) fn assemble_groups(anchor: &Ticket, candidates: &[Candidate]) -> Vec<GroupProposal> {
    let mut proposals = Vec::new();
    let mut state = SearchState {
        anchor,
        candidates,
        stack: Vec::new(),
        visited: 0,
        proposals: &mut proposals,
    };

    // The anchor on its own can already satisfy its bounds (solo play or a
    // full pre-formed party).
    state.record_if_viable(anchor.own_count, 0.0);
    state.extend(0, anchor.own_count, 0.0, anchor.min_count, anchor.max_count);

    proposals.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| {
                b.score_sum
                    .partial_cmp(&a.score_sum)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                a.created_avg
                    .partial_cmp(&b.created_avg)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    proposals
}

struct SearchState<'a> {
    anchor: &'a Ticket,
    candidates: &'a [Candidate],
    stack: Vec<usize>,
    visited: usize,
    proposals: &'a mut Vec<GroupProposal>,
}

impl SearchState<'_> {
    /// Depth-first extension of the current group with candidates from
    /// `start` on. `count`, `min_required` and `max_allowed` describe the
    /// group so far, anchor included.
    fn extend(
        &mut self,
        start: usize,
        count: usize,
        score_sum: f64,
        min_required: usize,
        max_allowed: usize,
    ) {
        for i in start..self.candidates.len() {
            if self.visited >= GROUP_SEARCH_LIMIT {
                return;
            }
            self.visited += 1;

            let candidate = &self.candidates[i];
            let ticket = &candidate.ticket;
            let next_count = count + ticket.own_count;
            let next_max = max_allowed.min(ticket.max_count);
            if next_count > next_max {
                // This candidate overflows the group; a later, smaller one
                // may still fit.
                continue;
            }
            let next_min = min_required.max(ticket.min_count);
            let next_score = score_sum + candidate.score;

            self.stack.push(i);
            if next_count >= next_min {
                self.record_if_viable(next_count, next_score);
            }
            self.extend(i + 1, next_count, next_score, next_min, next_max);
            self.stack.pop();
        }
    }

    /// Record the current stack as a proposal when the total satisfies
    /// every member's count multiple (bounds were checked on the way down).
    fn record_if_viable(&mut self, total_count: usize, score_sum: f64) {
        if total_count < self.anchor.min_count
            || total_count > self.anchor.max_count
            || total_count % self.anchor.count_multiple != 0
        {
            return;
        }
        for &i in &self.stack {
            if total_count % self.candidates[i].ticket.count_multiple != 0 {
                return;
            }
        }

        let mut created_sum = self.anchor.created_at as f64;
        for &i in &self.stack {
            created_sum += self.candidates[i].ticket.created_at as f64;
        }
        let created_avg = created_sum / (self.stack.len() + 1) as f64;

        self.proposals.push(GroupProposal {
            members: self.stack.clone(),
            total_count,
            score_sum,
            created_avg,
        });
    }
}
