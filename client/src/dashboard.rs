//! Dashboard statistics.

use crate::models::{AdminUser, Candidate, Faq};
use serde::Serialize;

/// One candidate's part of the vote.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteShare {
    pub candidate_id: String,
    pub name: String,
    pub votes: u64,
    /// Percent of all votes, rounded to one decimal
    pub percent: f64,
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_candidates: usize,
    pub total_users: usize,
    pub total_votes: u64,
    pub total_faqs: usize,
    pub users_voted: usize,
    /// Candidate with the most votes; `None` when nobody has votes yet.
    /// Ties go to the candidate listed first.
    pub leader: Option<VoteShare>,
    /// Shares in descending order of votes, list order among equals
    pub shares: Vec<VoteShare>,
}

impl DashboardStats {
    pub fn compute(candidates: &[Candidate], users: &[AdminUser], faqs: &[Faq]) -> Self {
        let total_votes: u64 = candidates.iter().map(|c| c.vote_count).sum();

        let mut shares: Vec<VoteShare> = candidates
            .iter()
            .map(|c| VoteShare {
                candidate_id: c.id.clone(),
                name: c.name.clone(),
                votes: c.vote_count,
                percent: percent(c.vote_count, total_votes),
            })
            .collect();
        // Stable sort keeps list order among ties.
        shares.sort_by(|a, b| b.votes.cmp(&a.votes));

        let leader = shares.first().filter(|s| s.votes > 0).cloned();

        Self {
            total_candidates: candidates.len(),
            total_users: users.len(),
            total_votes,
            total_faqs: faqs.len(),
            users_voted: users.iter().filter(|u| u.has_voted).count(),
            leader,
            shares,
        }
    }
}

/// `part` as a percentage of `total`, one decimal. Zero when `total` is zero.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}
