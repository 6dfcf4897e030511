// SPDX-License-Identifier: MIT
//! Engine configuration — loaded from `config.toml` in the data directory,
//! with every field optional and defaulted.
//!
//! The engine consumes this configuration, it does not own the policy: the
//! window lengths and limits mirror what the platform passes down, and any
//! field can be overridden per call through [`LeaderboardParams`].
//!
//! [`LeaderboardParams`]: crate::leaderboard::LeaderboardParams

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

use crate::leaderboard::model::Period;

const DEFAULT_RANK_LIMIT: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 20;

// ─── LeaderboardConfig ────────────────────────────────────────────────────────

/// Leaderboard windowing and sizing (`[leaderboard]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Aggregation window for the daily board, in days. Default: 1.
    pub daily_window_days: i64,
    /// Aggregation window for the weekly board, in days. Default: 7.
    pub weekly_window_days: i64,
    /// Aggregation window for the monthly board, in days. Default: 30.
    pub monthly_window_days: i64,
    /// Optional cap on the all-time board's window, in days.
    /// `None` = aggregate every daily record ever written.
    pub all_window_days: Option<i64>,
    /// Maximum number of ranked entries stored per snapshot. Default: 100.
    pub rank_limit: usize,
    /// Default page size served by the paginated reader. Default: 20.
    pub page_size: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            daily_window_days: 1,
            weekly_window_days: 7,
            monthly_window_days: 30,
            all_window_days: None,
            rank_limit: DEFAULT_RANK_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ─── DatabaseConfig ───────────────────────────────────────────────────────────

/// SQLite tuning (`[database]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Queries slower than this threshold are logged at WARN level
    /// (milliseconds). 0 disables slow-query logging. Default: 0.
    pub slow_query_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { slow_query_ms: 0 }
    }
}

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Data directory holding `ruleboard.db`.
    pub data_dir: PathBuf,
    /// Leaderboard windowing and sizing (`[leaderboard]`).
    pub leaderboard: LeaderboardConfig,
    /// SQLite tuning (`[database]`).
    pub database: DatabaseConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            leaderboard: LeaderboardConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `{data_dir}/config.toml`.
    ///
    /// A missing file yields defaults; a malformed file is logged at ERROR
    /// level and also yields defaults, so a bad edit never blocks a
    /// scheduled snapshot run.
    pub fn load(data_dir: &Path) -> Self {
        let mut cfg = load_toml(data_dir).unwrap_or_default();
        cfg.data_dir = data_dir.to_path_buf();
        cfg
    }

    /// Aggregation window for `period`, in days.
    ///
    /// `None` means no date filter (the all-time board aggregates the full
    /// history unless `all_window_days` caps it).
    pub fn window_days(&self, period: Period) -> Option<i64> {
        match period {
            Period::Daily => Some(self.leaderboard.daily_window_days),
            Period::Weekly => Some(self.leaderboard.weekly_window_days),
            Period::Monthly => Some(self.leaderboard.monthly_window_days),
            Period::All => self.leaderboard.all_window_days,
        }
    }
}

fn load_toml(data_dir: &Path) -> Option<EngineConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<EngineConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
