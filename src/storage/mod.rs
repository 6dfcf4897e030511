// SPDX-License-Identifier: MIT
//! SQLite storage — pool setup plus idempotent schema bootstrap.
//!
//! The engine owns four tables (`leaderboard_snapshots`, `badges`,
//! `user_badges`, `audit_log`) and creates them with `CREATE TABLE IF NOT
//! EXISTS` on startup. The content/metrics tables it reads (`rules`,
//! `rule_tags`, `users`, `votes`, `rule_metrics_daily`) belong to the
//! platform; [`Storage::ensure_platform_tables`] can provision matching
//! shapes for tests and standalone deployments and is a no-op when the
//! platform schema is already in place.

use anyhow::{Context as _, Result};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

/// Shared SQLite handle. Cloning is cheap (Arc-backed pool).
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (or create) `{data_dir}/ruleboard.db` and bootstrap the
    /// engine-owned schema.
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Open storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds: queries exceeding
    /// it are logged at WARN level. Set to 0 to disable.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("ruleboard.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Wrap an already-open pool (tests, or embedding into the platform's
    /// existing connection). Runs the engine schema bootstrap.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Create the engine-owned tables. Idempotent; safe on every boot.
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
                id         TEXT PRIMARY KEY,
                period     TEXT NOT NULL,
                scope      TEXT NOT NULL,
                scope_ref  TEXT NOT NULL DEFAULT '',
                day        TEXT NOT NULL,
                rank_json  TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_key_day
                ON leaderboard_snapshots(period, scope, scope_ref, day);
            CREATE INDEX IF NOT EXISTS idx_snapshots_created
                ON leaderboard_snapshots(period, scope, scope_ref, created_at);

            CREATE TABLE IF NOT EXISTS badges (
                id            TEXT PRIMARY KEY,
                slug          TEXT NOT NULL UNIQUE,
                name          TEXT NOT NULL,
                description   TEXT NOT NULL,
                criteria_json TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_badges (
                user_id    TEXT NOT NULL,
                badge_id   TEXT NOT NULL,
                awarded_at TEXT NOT NULL,
                UNIQUE(user_id, badge_id)
            );
            CREATE INDEX IF NOT EXISTS idx_user_badges_user ON user_badges(user_id);

            CREATE TABLE IF NOT EXISTS audit_log (
                id            TEXT PRIMARY KEY,
                actor_id      TEXT NOT NULL,
                action        TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_log(actor_id);
            ",
        )
        .execute(&self.pool)
        .await
        .context("create engine tables")?;
        Ok(())
    }

    /// Create the platform-owned tables the engine reads from.
    ///
    /// In production these already exist and every statement is a no-op;
    /// tests and standalone deployments call this to get a complete schema.
    pub async fn ensure_platform_tables(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id           TEXT PRIMARY KEY,
                handle       TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                avatar_url   TEXT
            );

            CREATE TABLE IF NOT EXISTS rules (
                id         TEXT PRIMARY KEY,
                slug       TEXT NOT NULL UNIQUE,
                title      TEXT NOT NULL,
                author_id  TEXT NOT NULL,
                status     TEXT NOT NULL DEFAULT 'draft',
                model      TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rules_author ON rules(author_id);

            CREATE TABLE IF NOT EXISTS rule_tags (
                rule_id TEXT NOT NULL,
                tag     TEXT NOT NULL,
                UNIQUE(rule_id, tag)
            );
            CREATE INDEX IF NOT EXISTS idx_rule_tags_tag ON rule_tags(tag);

            CREATE TABLE IF NOT EXISTS votes (
                id         TEXT PRIMARY KEY,
                rule_id    TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                value      INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(rule_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_votes_rule ON votes(rule_id);

            CREATE TABLE IF NOT EXISTS rule_metrics_daily (
                rule_id TEXT NOT NULL,
                date    TEXT NOT NULL,
                views   INTEGER NOT NULL DEFAULT 0,
                copies  INTEGER NOT NULL DEFAULT 0,
                saves   INTEGER NOT NULL DEFAULT 0,
                forks   INTEGER NOT NULL DEFAULT 0,
                votes   INTEGER NOT NULL DEFAULT 0,
                score   REAL NOT NULL DEFAULT 0.0,
                UNIQUE(rule_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_metrics_date ON rule_metrics_daily(date);
            ",
        )
        .execute(&self.pool)
        .await
        .context("create platform tables")?;
        Ok(())
    }
}
