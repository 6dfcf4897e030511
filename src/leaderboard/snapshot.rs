// SPDX-License-Identifier: MIT
//! Snapshot persistence — day-bucketed, idempotently overwritten rankings.
//!
//! Each `(period, scope, scope_ref)` key gets at most one row per UTC
//! calendar day, enforced by the unique index on `(period, scope,
//! scope_ref, day)` rather than by query-then-insert: two concurrent
//! recomputes for the same key land on the same row, last write wins.
//! A same-day overwrite replaces only `rank_json`; `id` and `created_at`
//! keep their first-write values, which preserves the row's position in
//! the most-recent-N ordering the delta calculator depends on.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use super::model::{LeaderboardEntry, Period, RankMeta, RankPayload, Scope, SnapshotRow};

/// Persisted-snapshot query + write layer.
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Upsert ───────────────────────────────────────────────────────────────

    /// Persist a computed ranking under its key's bucket for `now`'s UTC
    /// calendar day. Returns the snapshot row id.
    ///
    /// Repeated calls within one day mutate the existing row in place;
    /// the first call on a new day inserts a fresh row with
    /// `created_at = now`. Any `rank_delta` values on the input are
    /// dropped: deltas exist only in the read path.
    pub async fn upsert_snapshot(
        &self,
        period: Period,
        scope: &Scope,
        window_days: Option<i64>,
        entries: Vec<LeaderboardEntry>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let entries = entries
            .into_iter()
            .map(|e| LeaderboardEntry {
                rank_delta: None,
                ..e
            })
            .collect();
        let payload = RankPayload {
            entries,
            meta: RankMeta {
                period,
                scope: scope.kind().to_string(),
                scope_ref: scope.reference().map(str::to_string),
                window_days,
                generated_at: now.to_rfc3339(),
            },
        };
        let rank_json = serde_json::to_string(&payload).context("serialise rank payload")?;

        let id = Uuid::new_v4().to_string();
        let day = now.date_naive().to_string();
        let created_at = now.to_rfc3339();

        // On conflict the candidate id is discarded and the existing row's
        // id comes back through RETURNING.
        let row_id: String = sqlx::query_scalar(
            "INSERT INTO leaderboard_snapshots
                 (id, period, scope, scope_ref, day, rank_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(period, scope, scope_ref, day)
                 DO UPDATE SET rank_json = excluded.rank_json
             RETURNING id",
        )
        .bind(&id)
        .bind(period.as_str())
        .bind(scope.kind())
        .bind(scope.ref_column())
        .bind(&day)
        .bind(&rank_json)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert snapshot {period} {scope} {day}"))?;

        Ok(row_id)
    }

    // ─── Lookups ──────────────────────────────────────────────────────────────

    /// Most recent snapshot for the key, `None` when nothing has been
    /// computed yet.
    pub async fn latest_snapshot(
        &self,
        period: Period,
        scope: &Scope,
    ) -> Result<Option<SnapshotRow>> {
        sqlx::query_as(
            "SELECT id, period, scope, scope_ref, day, rank_json, created_at
               FROM leaderboard_snapshots
              WHERE period = ?1 AND scope = ?2 AND scope_ref = ?3
           ORDER BY created_at DESC, day DESC
              LIMIT 1",
        )
        .bind(period.as_str())
        .bind(scope.kind())
        .bind(scope.ref_column())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("latest snapshot {period} {scope}"))
    }

    /// The snapshot immediately preceding the latest one for the key,
    /// the comparison baseline for rank deltas. `None` on day one.
    pub async fn previous_snapshot(
        &self,
        period: Period,
        scope: &Scope,
    ) -> Result<Option<SnapshotRow>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT id, period, scope, scope_ref, day, rank_json, created_at
               FROM leaderboard_snapshots
              WHERE period = ?1 AND scope = ?2 AND scope_ref = ?3
           ORDER BY created_at DESC, day DESC
              LIMIT 2",
        )
        .bind(period.as_str())
        .bind(scope.kind())
        .bind(scope.ref_column())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("previous snapshot {period} {scope}"))?;

        Ok(rows.into_iter().nth(1))
    }
}

// ─── Rank deltas ──────────────────────────────────────────────────────────────

/// Populate `rank_delta` on `entries` against the previous snapshot's
/// payload.
///
/// `delta = prev_rank − current_rank`: positive means the rule moved up
/// the board. Entries absent from the previous snapshot keep `None`;
/// a new entrant is not the same thing as "moved 0 places" and is never
/// coerced to a number.
pub fn with_deltas(entries: &mut [LeaderboardEntry], previous: Option<&RankPayload>) {
    let prev_ranks: HashMap<&str, i64> = previous
        .map(|p| {
            p.entries
                .iter()
                .map(|e| (e.rule_id.as_str(), e.rank))
                .collect()
        })
        .unwrap_or_default();

    for entry in entries.iter_mut() {
        entry.rank_delta = prev_ranks
            .get(entry.rule_id.as_str())
            .map(|prev| prev - entry.rank);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::model::AuthorRef;

    fn entry(rank: i64, rule_id: &str) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            rule_id: rule_id.to_string(),
            slug: format!("slug-{rule_id}"),
            title: format!("Rule {rule_id}"),
            author: AuthorRef {
                id: "u1".to_string(),
                handle: "alice".to_string(),
                display_name: "Alice".to_string(),
                avatar_url: None,
            },
            score: 1.0,
            views: 0,
            copies: 0,
            saves: 0,
            forks: 0,
            votes: 0,
            rank_delta: None,
        }
    }

    fn payload(entries: Vec<LeaderboardEntry>) -> RankPayload {
        RankPayload {
            entries,
            meta: RankMeta {
                period: Period::Weekly,
                scope: "global".to_string(),
                scope_ref: None,
                window_days: Some(7),
                generated_at: "2026-08-06T00:00:00Z".to_string(),
            },
        }
    }

    #[test]
    fn deltas_against_previous_snapshot() {
        // Previous: A at rank 3, B at rank 1. Current: A 1, B 2, C 3.
        let previous = payload(vec![entry(1, "B"), entry(3, "A")]);
        let mut current = vec![entry(1, "A"), entry(2, "B"), entry(3, "C")];
        with_deltas(&mut current, Some(&previous));

        assert_eq!(current[0].rank_delta, Some(2)); // A: 3 → 1
        assert_eq!(current[1].rank_delta, Some(-1)); // B: 1 → 2
        assert_eq!(current[2].rank_delta, None); // C: new entrant
    }

    #[test]
    fn no_previous_snapshot_leaves_all_none() {
        let mut current = vec![entry(1, "A"), entry(2, "B")];
        with_deltas(&mut current, None);
        assert!(current.iter().all(|e| e.rank_delta.is_none()));
    }

    #[test]
    fn unchanged_position_is_zero_not_none() {
        let previous = payload(vec![entry(1, "A")]);
        let mut current = vec![entry(1, "A")];
        with_deltas(&mut current, Some(&previous));
        assert_eq!(current[0].rank_delta, Some(0));
    }
}
