// SPDX-License-Identifier: MIT
//! Ranking — deterministic ordering and dense rank assignment.
//!
//! Ordering is `score` descending with ties broken by `rule_id` ascending.
//! The tie-break is part of the contract: two runs over identical input
//! must produce byte-identical rankings, so ties are resolved *before*
//! rank assignment and every rank from 1..=N is distinct even when scores
//! collide.

use crate::leaderboard::model::{LeaderboardEntry, RuleAggregate};

/// Order candidates and assign dense ranks, then truncate to `limit`.
///
/// Truncation happens after rank assignment, never before: rank 1 is
/// always the global best, regardless of the limit.
pub fn rank_candidates(mut candidates: Vec<RuleAggregate>, limit: usize) -> Vec<LeaderboardEntry> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    let mut entries: Vec<LeaderboardEntry> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| LeaderboardEntry {
            rank: (i + 1) as i64,
            rule_id: c.rule_id,
            slug: c.slug,
            title: c.title,
            author: c.author,
            score: c.score,
            views: c.views,
            copies: c.copies,
            saves: c.saves,
            forks: c.forks,
            votes: c.votes,
            rank_delta: None,
        })
        .collect();

    entries.truncate(limit);
    entries
}

/// Percentile of `rank` within a board of `total` entries, rounded to two
/// decimals. Rank 1 is the 100th percentile; rank N of N is `100 / N`.
pub fn percentile(rank: i64, total: usize) -> f64 {
    if total == 0 || rank < 1 {
        return 0.0;
    }
    let raw = (total as f64 - rank as f64 + 1.0) / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

// ─── Tests ────────────────────────────────────────────────────────────────────
