// SPDX-License-Identifier: MIT
//! Award ledger — the idempotent write path turning an eligibility
//! decision into a durable, non-duplicated badge award plus an audit row.
//!
//! [`AwardLedger::award_if_eligible`] never returns an error: a missing
//! badge slug, an already-held badge, a lost duplicate race, and any
//! persistence failure all surface as "not awarded". Badge bookkeeping
//! must never fail the publish/vote/copy action that triggered it; the
//! recheck sweep exists to repair silently missed awards.

use anyhow::{Context as _, Result};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Fire-and-forget side effect of a successful award.
///
/// The ledger never dispatches notifications itself — it hands this back
/// to the caller, which may deliver it or drop it on failure without
/// affecting the award's durability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeNotification {
    pub user_id: String,
    pub badge_slug: String,
    pub badge_name: String,
}

/// Result of one award attempt.
#[derive(Debug, Clone, Default)]
pub struct AwardOutcome {
    /// `true` exactly once per `(user, badge)` pair, ever.
    pub awarded: bool,
    /// Present iff `awarded`.
    pub notification: Option<BadgeNotification>,
}

impl AwardOutcome {
    pub(crate) fn not_awarded() -> Self {
        Self::default()
    }
}

/// Aggregate result of a bulk operation (top-10 sweep, recheck).
#[derive(Debug, Clone, Default)]
pub struct BulkAwardOutcome {
    /// Number of badges newly awarded by this invocation.
    pub awarded: usize,
    /// Pending notifications for every new award, in award order.
    pub notifications: Vec<BadgeNotification>,
}

impl BulkAwardOutcome {
    pub(crate) fn absorb(&mut self, outcome: AwardOutcome) {
        if outcome.awarded {
            self.awarded += 1;
        }
        self.notifications.extend(outcome.notification);
    }
}

/// Idempotent badge award writer.
pub struct AwardLedger {
    pool: SqlitePool,
}

impl AwardLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Award `badge_slug` to `user_id` unless already held.
    ///
    /// `metadata` is award-specific context (net score at decision time,
    /// weekly rank, …) recorded in the audit log. Calling twice with the
    /// same `(user, slug)` yields one durable award and outcomes of
    /// `awarded = true` then `false`, in some order, even under
    /// concurrent invocations: the `UNIQUE(user_id, badge_id)`
    /// constraint, not the pre-check, is what closes the race.
    pub async fn award_if_eligible(
        &self,
        user_id: &str,
        badge_slug: &str,
        metadata: Option<serde_json::Value>,
    ) -> AwardOutcome {
        match self.try_award(user_id, badge_slug, metadata).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    err = %e,
                    user_id,
                    badge_slug,
                    "badge award failed, skipping (recheck sweep will repair)"
                );
                AwardOutcome::not_awarded()
            }
        }
    }

    async fn try_award(
        &self,
        user_id: &str,
        badge_slug: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<AwardOutcome> {
        // A slug missing from the catalog is a configuration error (seeding
        // not run, or a typo at the call site): warn, never throw.
        let badge: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM badges WHERE slug = ?")
                .bind(badge_slug)
                .fetch_optional(&self.pool)
                .await
                .context("resolve badge slug")?;
        let Some((badge_id, badge_name)) = badge else {
            warn!(badge_slug, "unknown badge slug, was the catalog seeded?");
            return Ok(AwardOutcome::not_awarded());
        };

        let already_held: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM user_badges WHERE user_id = ? AND badge_id = ?")
                .bind(user_id)
                .bind(&badge_id)
                .fetch_optional(&self.pool)
                .await
                .context("check existing award")?;
        if already_held.is_some() {
            return Ok(AwardOutcome::not_awarded());
        }

        let now = Utc::now().to_rfc3339();
        let mut audit_metadata = json!({
            "badgeSlug": badge_slug,
            "userId": user_id,
        });
        if let Some(extra) = metadata {
            audit_metadata["badgeMetadata"] = extra;
        }

        // One atomic unit: the award row and its audit record commit
        // together or not at all.
        let mut tx = self.pool.begin().await.context("begin award transaction")?;
        let insert = sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id, awarded_at) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(&badge_id)
        .bind(&now)
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {}
            Err(e) => {
                // A concurrent caller won the race between our pre-check and
                // this insert: the unique constraint fired. That is the
                // duplicate-award case, not a failure.
                let lost_race = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if lost_race {
                    return Ok(AwardOutcome::not_awarded());
                }
                return Err(anyhow::Error::from(e).context("insert user badge"));
            }
        }

        sqlx::query(
            "INSERT INTO audit_log (id, actor_id, action, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind("badge.awarded")
        .bind(audit_metadata.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .context("insert audit log entry")?;

        tx.commit().await.context("commit award transaction")?;

        Ok(AwardOutcome {
            awarded: true,
            notification: Some(BadgeNotification {
                user_id: user_id.to_string(),
                badge_slug: badge_slug.to_string(),
                badge_name,
            }),
        })
    }

    /// Badge slugs currently held by a user, in award order.
    pub async fn badges_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT b.slug
               FROM user_badges ub
               JOIN badges b ON b.id = ub.badge_id
              WHERE ub.user_id = ?
           ORDER BY ub.awarded_at ASC, b.slug ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("list user badges")?;
        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }
}
