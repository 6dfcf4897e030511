// SPDX-License-Identifier: MIT
//! ruleboard — leaderboard snapshot & achievement engine for the RuleHub
//! community platform.
//!
//! The engine aggregates per-rule daily metrics into deterministic,
//! day-bucketed leaderboard snapshots, computes rank movement against the
//! previous snapshot at read time, and awards one-shot achievement badges
//! without ever double-awarding. The platform's HTTP layer, auth, and
//! notification delivery live elsewhere; everything here is invoked
//! programmatically (see the `ruleboard` binary for the batch trigger
//! surface).

pub mod config;
pub mod gamification;
pub mod leaderboard;
pub mod metrics;
pub mod storage;

use anyhow::Result;
use chrono::{DateTime, Utc};

use config::EngineConfig;
use gamification::{AwardLedger, AwardOutcome, BulkAwardOutcome};
use leaderboard::model::{LeaderboardEntry, LeaderboardPage, Period, RankInfo, Scope};
use leaderboard::snapshot::SnapshotStore;
use leaderboard::LeaderboardParams;
use metrics::MetricsStore;
use storage::Storage;

/// Shared engine handle: configuration plus the SQLite pool, with
/// convenience methods covering the engine's whole inbound surface.
///
/// Every ranking operation takes an injected `now` so scheduled jobs and
/// tests get deterministic output; only the binary reads the wall clock.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    storage: Storage,
}

impl Engine {
    /// Open (or create) the database under `config.data_dir` and
    /// bootstrap the engine schema.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        let storage =
            Storage::new_with_slow_query(&config.data_dir, config.database.slow_query_ms).await?;
        Ok(Self { config, storage })
    }

    /// Build an engine over an existing pool (tests, or embedding into
    /// the platform's connection).
    pub async fn from_pool(config: EngineConfig, pool: sqlx::SqlitePool) -> Result<Self> {
        let storage = Storage::from_pool(pool).await?;
        Ok(Self { config, storage })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Metrics read layer over the platform's content tables.
    pub fn metrics(&self) -> MetricsStore {
        MetricsStore::new(self.storage.pool())
    }

    /// Snapshot query + write layer.
    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.storage.pool())
    }

    /// Badge award writer.
    pub fn ledger(&self) -> AwardLedger {
        AwardLedger::new(self.storage.pool())
    }

    // ─── Leaderboard ──────────────────────────────────────────────────────────

    /// Aggregate and rank one board. Pure read; nothing is persisted.
    pub async fn compute_leaderboard(
        &self,
        params: &LeaderboardParams,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>> {
        leaderboard::compute_leaderboard(&self.metrics(), params, now).await
    }

    /// Persist a computed ranking into its day bucket. Returns the
    /// snapshot id (unchanged when overwriting the same day's row).
    pub async fn upsert_snapshot(
        &self,
        params: &LeaderboardParams,
        entries: Vec<LeaderboardEntry>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.snapshots()
            .upsert_snapshot(params.period, &params.scope, params.window_days, entries, now)
            .await
    }

    /// Compute + upsert in one step: the cron trigger's entry point.
    /// Returns the snapshot id and the number of ranked entries.
    pub async fn refresh_snapshot(
        &self,
        period: Period,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> Result<(String, usize)> {
        let params = LeaderboardParams::for_period(period, scope, &self.config);
        let entries = self.compute_leaderboard(&params, now).await?;
        let count = entries.len();
        let id = self.upsert_snapshot(&params, entries, now).await?;
        Ok((id, count))
    }

    /// The comparison baseline for rank deltas: the snapshot immediately
    /// preceding the latest one for the key. `None` on day one.
    pub async fn previous_snapshot(
        &self,
        period: Period,
        scope: &Scope,
    ) -> Result<Option<leaderboard::model::SnapshotRow>> {
        self.snapshots().previous_snapshot(period, scope).await
    }

    /// Read one page of the latest snapshot, rank deltas populated.
    /// `limit = None` uses the configured page size.
    pub async fn read_leaderboard(
        &self,
        period: Period,
        scope: &Scope,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<LeaderboardPage> {
        let limit = limit.unwrap_or(self.config.leaderboard.page_size);
        leaderboard::reader::read_leaderboard(&self.snapshots(), period, scope, cursor, limit)
            .await
    }

    /// Position (rank, percentile, delta) of one rule on the latest board.
    pub async fn rule_rank(
        &self,
        period: Period,
        scope: &Scope,
        rule_id: &str,
    ) -> Result<Option<RankInfo>> {
        leaderboard::reader::rule_rank(&self.snapshots(), period, scope, rule_id).await
    }

    // ─── Achievements ─────────────────────────────────────────────────────────

    /// Mirror the badge catalog into the `badges` table. Idempotent;
    /// returns the number newly inserted.
    pub async fn seed_badge_catalog(&self) -> Result<usize> {
        gamification::seed_badge_catalog(&self.storage.pool()).await
    }

    /// Award a badge unless already held. Never errors; see
    /// [`AwardLedger::award_if_eligible`].
    pub async fn award_if_eligible(
        &self,
        user_id: &str,
        badge_slug: &str,
        metadata: Option<serde_json::Value>,
    ) -> AwardOutcome {
        self.ledger()
            .award_if_eligible(user_id, badge_slug, metadata)
            .await
    }

    /// Backfill/repair sweep over one user's badges.
    pub async fn recheck_user_badges(&self, user_id: &str) -> BulkAwardOutcome {
        gamification::recheck_user_badges(&self.metrics(), &self.ledger(), user_id).await
    }
}
