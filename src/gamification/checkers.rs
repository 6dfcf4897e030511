// SPDX-License-Identifier: MIT
//! Eligibility checkers — one per achievement, each a pure read against
//! the metrics/content tables followed by a conditional ledger call.
//!
//! Checkers follow the ledger's no-throw contract: a failed read is
//! logged and reported as "not awarded" so the triggering platform action
//! (publish, vote, copy) is never blocked by badge bookkeeping.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashSet;
use tracing::warn;

use super::catalog::{
    FIRST_CONTRIBUTION, HUNDRED_COPIES, STREAK_7, TEN_UPVOTES, TOP_10_WEEK, VERIFIED_AUTHOR,
};
use super::ledger::{AwardLedger, AwardOutcome, BulkAwardOutcome};
use crate::metrics::MetricsStore;

/// Upper bound the top-10 sweep enforces on its input.
const TOP_WEEKLY_AWARDS: usize = 10;

fn read_or_skip<T>(result: Result<T>, op: &'static str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(err = %e, op, "badge check read failed, skipping");
            None
        }
    }
}

// ─── Per-event checkers ───────────────────────────────────────────────────────

/// Award `first-contribution` when the user's published-rule count is
/// exactly 1.
///
/// The predicate is `== 1`, not `>= 1`: the checker is meant to fire at
/// the moment of the first publish. Invoke it after each publish event;
/// run as a periodic sweep it stays silent once the count passes 1.
pub async fn check_first_contribution(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    user_id: &str,
) -> AwardOutcome {
    let Some(count) = read_or_skip(
        metrics.published_rule_count(user_id).await,
        "published rule count",
    ) else {
        return AwardOutcome::not_awarded();
    };
    if count != 1 {
        return AwardOutcome::not_awarded();
    }
    ledger
        .award_if_eligible(user_id, FIRST_CONTRIBUTION, None)
        .await
}

/// Award `ten-upvotes` to the rule's author when its net vote score
/// (upvotes − downvotes) reaches 10. The audit metadata records the net
/// score at decision time.
pub async fn check_ten_upvotes(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    rule_id: &str,
) -> AwardOutcome {
    let Some(net) = read_or_skip(metrics.net_vote_score(rule_id).await, "net vote score") else {
        return AwardOutcome::not_awarded();
    };
    if net < 10 {
        return AwardOutcome::not_awarded();
    }
    let Some(author) = read_or_skip(metrics.rule_author_id(rule_id).await, "rule author").flatten()
    else {
        return AwardOutcome::not_awarded();
    };
    ledger
        .award_if_eligible(
            &author,
            TEN_UPVOTES,
            Some(json!({ "ruleId": rule_id, "netScore": net })),
        )
        .await
}

/// Award `hundred-copies` to the rule's author when lifetime copies
/// (summed over all daily records) reach 100.
pub async fn check_hundred_copies(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    rule_id: &str,
) -> AwardOutcome {
    let Some(copies) = read_or_skip(metrics.total_copies(rule_id).await, "total copies") else {
        return AwardOutcome::not_awarded();
    };
    if copies < 100 {
        return AwardOutcome::not_awarded();
    }
    let Some(author) = read_or_skip(metrics.rule_author_id(rule_id).await, "rule author").flatten()
    else {
        return AwardOutcome::not_awarded();
    };
    ledger
        .award_if_eligible(
            &author,
            HUNDRED_COPIES,
            Some(json!({ "ruleId": rule_id, "copies": copies })),
        )
        .await
}

/// Direct award of `verified-author`, no predicate, triggered by the
/// platform when identity verification is granted.
pub async fn award_verified_author(ledger: &AwardLedger, user_id: &str) -> AwardOutcome {
    ledger.award_if_eligible(user_id, VERIFIED_AUTHOR, None).await
}

/// Award `streak-7` when the user contributed (created a rule or cast a
/// vote) on each of the 7 consecutive UTC days ending with `now`'s day.
pub async fn check_seven_day_streak(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    user_id: &str,
    now: DateTime<Utc>,
) -> AwardOutcome {
    let since_day = (now - Duration::days(6)).date_naive().to_string();
    let Some(days) = read_or_skip(
        metrics.contribution_days(user_id, &since_day).await,
        "contribution days",
    ) else {
        return AwardOutcome::not_awarded();
    };

    let active: HashSet<String> = days.into_iter().collect();
    let complete = (0..7)
        .map(|i| (now - Duration::days(i)).date_naive().to_string())
        .all(|day| active.contains(&day));
    if !complete {
        return AwardOutcome::not_awarded();
    }
    ledger
        .award_if_eligible(user_id, STREAK_7, Some(json!({ "days": 7 })))
        .await
}

// ─── Bulk operations ──────────────────────────────────────────────────────────

/// Award `top-10-week` to the authors of the first ≤10 ranked rule ids.
///
/// Called with the weekly board's entries in rank order after a snapshot
/// recompute. Rules that can no longer be resolved are skipped; the
/// returned count reflects badges actually awarded, which may be fewer
/// than 10 (deleted rules, authors who already hold the badge).
pub async fn award_top10_weekly_badges(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    ranked_rule_ids: &[String],
) -> BulkAwardOutcome {
    let mut outcome = BulkAwardOutcome::default();

    for (i, rule_id) in ranked_rule_ids.iter().take(TOP_WEEKLY_AWARDS).enumerate() {
        let rank = (i + 1) as i64;
        let Some(author) =
            read_or_skip(metrics.rule_author_id(rule_id).await, "rule author").flatten()
        else {
            continue;
        };
        let awarded = ledger
            .award_if_eligible(
                &author,
                TOP_10_WEEK,
                Some(json!({ "ruleId": rule_id, "rank": rank })),
            )
            .await;
        outcome.absorb(awarded);
    }

    outcome
}

/// Backfill/repair sweep over one user's badges.
///
/// Re-runs first-contribution once, then ten-upvotes and hundred-copies
/// for each published rule the user owns. Not the steady-state path
/// (the per-event checkers are), but repairs awards lost to transient
/// store failures.
pub async fn recheck_user_badges(
    metrics: &MetricsStore,
    ledger: &AwardLedger,
    user_id: &str,
) -> BulkAwardOutcome {
    let mut outcome = BulkAwardOutcome::default();

    outcome.absorb(check_first_contribution(metrics, ledger, user_id).await);

    let Some(rule_ids) = read_or_skip(
        metrics.published_rule_ids(user_id).await,
        "published rule ids",
    ) else {
        return outcome;
    };
    for rule_id in &rule_ids {
        outcome.absorb(check_ten_upvotes(metrics, ledger, rule_id).await);
        outcome.absorb(check_hundred_copies(metrics, ledger, rule_id).await);
    }

    outcome
}
