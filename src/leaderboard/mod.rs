// SPDX-License-Identifier: MIT
//! Leaderboard pipeline — aggregate, rank, snapshot, diff, paginate.
//!
//! The write path (`compute_leaderboard` → [`SnapshotStore::upsert_snapshot`])
//! runs on an external trigger (cron or post-event hook); the read path
//! ([`reader::read_leaderboard`]) is consumed by the platform's API layer.
//! Both take an injected `now`, never the wall clock, so a fixed store
//! state always produces the same board.

pub mod model;
pub mod rank;
pub mod reader;
pub mod snapshot;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::metrics::MetricsStore;
use model::{LeaderboardEntry, Period, Scope};

/// Parameters for one leaderboard computation.
#[derive(Debug, Clone)]
pub struct LeaderboardParams {
    pub period: Period,
    pub scope: Scope,
    /// Aggregation window in days; `None` = no date filter.
    pub window_days: Option<i64>,
    /// Maximum number of entries retained after ranking.
    pub limit: usize,
}

impl LeaderboardParams {
    /// Build params for a period/scope using the configured window and
    /// limit. Callers can still override either field afterwards.
    pub fn for_period(period: Period, scope: Scope, config: &EngineConfig) -> Self {
        Self {
            period,
            scope,
            window_days: config.window_days(period),
            limit: config.leaderboard.rank_limit,
        }
    }
}

/// Aggregate the window and rank the result.
///
/// Pure function of store state and `now`: no side effects, and two calls
/// over identical input yield identical ordered output (see
/// [`rank::rank_candidates`] for the tie-break contract).
pub async fn compute_leaderboard(
    metrics: &MetricsStore,
    params: &LeaderboardParams,
    now: DateTime<Utc>,
) -> Result<Vec<LeaderboardEntry>> {
    let candidates = metrics
        .aggregate_window(&params.scope, params.window_days, now)
        .await?;
    Ok(rank::rank_candidates(candidates, params.limit))
}
