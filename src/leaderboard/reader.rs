// SPDX-License-Identifier: MIT
//! Paginated read path — serves slices of the latest snapshot with rank
//! deltas populated.
//!
//! Pagination walks the snapshot's frozen entries array rather than
//! re-querying live data, so two pages fetched against the same snapshot
//! never overlap or skip. A snapshot overwritten between page fetches can
//! change the second page's contents; that is the documented latest-wins
//! trade-off, not a bug.

use anyhow::Result;

use super::model::{
    LeaderboardPage, PageMeta, Pagination, Period, RankInfo, Scope,
};
use super::rank::percentile;
use super::snapshot::{with_deltas, SnapshotStore};

/// Read one page of the latest leaderboard snapshot for the key.
///
/// `cursor` is the `rule_id` of the last entry the caller has seen. An
/// unknown or stale cursor (e.g. invalidated by a same-day overwrite
/// between pages) restarts from the top rather than erroring.
///
/// `limit` is clamped to at least 1.
pub async fn read_leaderboard(
    snapshots: &SnapshotStore,
    period: Period,
    scope: &Scope,
    cursor: Option<&str>,
    limit: usize,
) -> Result<LeaderboardPage> {
    let limit = limit.max(1);

    let Some(row) = snapshots.latest_snapshot(period, scope).await? else {
        // No snapshot yet: an expected steady-state on day one, not an error.
        return Ok(LeaderboardPage {
            entries: Vec::new(),
            meta: PageMeta {
                period,
                scope: scope.kind().to_string(),
                scope_ref: scope.reference().map(str::to_string),
                window_days: None,
                generated_at: None,
                total_entries: 0,
            },
            pagination: Pagination {
                has_more: false,
                next_cursor: None,
            },
        });
    };

    let payload = row.payload()?;
    let previous = match snapshots.previous_snapshot(period, scope).await? {
        Some(prev_row) => Some(prev_row.payload()?),
        None => None,
    };

    let mut entries = payload.entries;
    with_deltas(&mut entries, previous.as_ref());

    let total_entries = entries.len();
    let start = match cursor {
        Some(cursor) => entries
            .iter()
            .position(|e| e.rule_id == cursor)
            .map(|i| i + 1)
            .unwrap_or(0),
        None => 0,
    };

    let has_more = start + limit < total_entries;
    let page: Vec<_> = entries
        .into_iter()
        .skip(start)
        .take(limit)
        .collect();
    let next_cursor = if has_more {
        page.last().map(|e| e.rule_id.clone())
    } else {
        None
    };

    Ok(LeaderboardPage {
        entries: page,
        meta: PageMeta {
            period,
            scope: scope.kind().to_string(),
            scope_ref: scope.reference().map(str::to_string),
            window_days: payload.meta.window_days,
            generated_at: Some(payload.meta.generated_at),
            total_entries,
        },
        pagination: Pagination {
            has_more,
            next_cursor,
        },
    })
}

/// Position of one rule within the latest snapshot for the key.
///
/// Returns `None` when there is no snapshot yet or the rule is not on the
/// board.
pub async fn rule_rank(
    snapshots: &SnapshotStore,
    period: Period,
    scope: &Scope,
    rule_id: &str,
) -> Result<Option<RankInfo>> {
    let Some(row) = snapshots.latest_snapshot(period, scope).await? else {
        return Ok(None);
    };

    let payload = row.payload()?;
    let previous = match snapshots.previous_snapshot(period, scope).await? {
        Some(prev_row) => Some(prev_row.payload()?),
        None => None,
    };

    let mut entries = payload.entries;
    with_deltas(&mut entries, previous.as_ref());

    let total_entries = entries.len();
    Ok(entries.into_iter().find(|e| e.rule_id == rule_id).map(|e| {
        RankInfo {
            rank: e.rank,
            total_entries,
            percentile: percentile(e.rank, total_entries),
            rank_delta: e.rank_delta,
        }
    }))
}
