// SPDX-License-Identifier: MIT
//! Metrics read layer — windowed aggregation over the platform's daily
//! counter table plus the per-rule/per-user counters the badge checkers
//! evaluate.
//!
//! Everything here is a pure read: for fixed table contents and a fixed
//! `now`, every function returns identical output on every call. All
//! writes to `rule_metrics_daily` happen in the platform, outside this
//! engine.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::leaderboard::model::{AuthorRef, RuleAggregate, Scope};

/// Query layer over the platform's content and metrics tables.
pub struct MetricsStore {
    pool: SqlitePool,
}

impl MetricsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Window aggregation ───────────────────────────────────────────────────

    /// Sum each published rule's daily counters over the window and take
    /// the max of its daily quality score.
    ///
    /// `window_days = None` means no date filter (the all-time board).
    /// Rules with zero views **and** zero copies in the window are absent
    /// from the result; they are not ranked at all.
    ///
    /// Output order is whatever SQLite produces; the ranker owns ordering.
    pub async fn aggregate_window(
        &self,
        scope: &Scope,
        window_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RuleAggregate>> {
        let mut sql = String::from(
            "SELECT r.id, r.slug, r.title,
                    u.id, u.handle, u.display_name, u.avatar_url,
                    COALESCE(SUM(m.views), 0)  AS views,
                    COALESCE(SUM(m.copies), 0) AS copies,
                    COALESCE(SUM(m.saves), 0)  AS saves,
                    COALESCE(SUM(m.forks), 0)  AS forks,
                    COALESCE(SUM(m.votes), 0)  AS votes,
                    COALESCE(MAX(m.score), 0.0) AS score
               FROM rules r
               JOIN users u ON u.id = r.author_id
               JOIN rule_metrics_daily m ON m.rule_id = r.id",
        );

        let cutoff = window_days
            .map(|days| (now - Duration::days(days)).date_naive().to_string());
        if cutoff.is_some() {
            sql.push_str(" AND m.date >= ?");
        }

        sql.push_str(" WHERE r.status = 'published'");
        match scope {
            Scope::Global => {}
            Scope::Tag(_) => sql.push_str(
                " AND EXISTS (SELECT 1 FROM rule_tags t
                               WHERE t.rule_id = r.id AND t.tag = ?)",
            ),
            Scope::Model(_) => sql.push_str(" AND r.model = ?"),
        }

        sql.push_str(
            " GROUP BY r.id
              HAVING SUM(m.views) + SUM(m.copies) > 0",
        );

        let mut query = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                String,
                String,
                String,
                Option<String>,
                i64,
                i64,
                i64,
                i64,
                i64,
                f64,
            ),
        >(&sql);
        if let Some(cutoff) = &cutoff {
            query = query.bind(cutoff.clone());
        }
        if let Some(reference) = scope.reference() {
            query = query.bind(reference.to_string());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("aggregate window for scope {scope}"))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    rule_id,
                    slug,
                    title,
                    author_id,
                    handle,
                    display_name,
                    avatar_url,
                    views,
                    copies,
                    saves,
                    forks,
                    votes,
                    score,
                )| RuleAggregate {
                    rule_id,
                    slug,
                    title,
                    author: AuthorRef {
                        id: author_id,
                        handle,
                        display_name,
                        avatar_url,
                    },
                    score,
                    views,
                    copies,
                    saves,
                    forks,
                    votes,
                },
            )
            .collect())
    }

    // ─── Checker counters ─────────────────────────────────────────────────────

    /// Number of published rules authored by `user_id`.
    pub async fn published_rule_count(&self, user_id: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM rules WHERE author_id = ? AND status = 'published'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("published rule count")
    }

    /// IDs of the user's published rules, oldest first.
    pub async fn published_rule_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM rules
              WHERE author_id = ? AND status = 'published'
           ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("published rule ids")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Net vote score for a rule: upvotes minus downvotes.
    pub async fn net_vote_score(&self, rule_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COALESCE(SUM(value), 0) FROM votes WHERE rule_id = ?")
            .bind(rule_id)
            .fetch_one(&self.pool)
            .await
            .context("net vote score")
    }

    /// Lifetime copy total for a rule, summed over all daily records.
    pub async fn total_copies(&self, rule_id: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(copies), 0) FROM rule_metrics_daily WHERE rule_id = ?",
        )
        .bind(rule_id)
        .fetch_one(&self.pool)
        .await
        .context("total copies")
    }

    /// Author of a rule, `None` when the rule no longer resolves.
    pub async fn rule_author_id(&self, rule_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT author_id FROM rules WHERE id = ?")
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await
            .context("rule author lookup")?;
        Ok(row.map(|(id,)| id))
    }

    /// Distinct UTC days (`YYYY-MM-DD`, ascending) on which the user
    /// contributed (created a rule or cast a vote) from `since_day`
    /// onwards. Backs the streak checker.
    pub async fn contribution_days(
        &self,
        user_id: &str,
        since_day: &str,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT d FROM (
                 SELECT date(created_at) AS d FROM rules
                  WHERE author_id = ?1 AND date(created_at) >= ?2
                 UNION
                 SELECT date(created_at) AS d FROM votes
                  WHERE user_id = ?1 AND date(created_at) >= ?2
             ) ORDER BY d ASC",
        )
        .bind(user_id)
        .bind(since_day)
        .fetch_all(&self.pool)
        .await
        .context("contribution days")?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }
}
