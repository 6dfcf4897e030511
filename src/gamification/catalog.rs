// SPDX-License-Identifier: MIT
//! Badge catalog — the six achievement definitions and the idempotent
//! seeding routine.
//!
//! Badge slugs are kebab-case strings (e.g. `"first-contribution"`) and
//! are stable across releases; the platform's UI keys icons off them.

use anyhow::{Context as _, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

// ─── Badge slug constants ─────────────────────────────────────────────────────

pub const FIRST_CONTRIBUTION: &str = "first-contribution";
pub const TEN_UPVOTES: &str = "ten-upvotes";
pub const HUNDRED_COPIES: &str = "hundred-copies";
pub const VERIFIED_AUTHOR: &str = "verified-author";
pub const TOP_10_WEEK: &str = "top-10-week";
pub const STREAK_7: &str = "streak-7";

// ─── Criteria ─────────────────────────────────────────────────────────────────

/// Typed eligibility criteria. One variant per criteria family so
/// checkers can match exhaustively, never a free-form map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Criteria {
    /// Granted when a named one-shot event occurs (verification granted,
    /// first publish, a top-10 weekly finish).
    Event { name: String },
    /// Granted when a metric first reaches a threshold.
    Threshold { metric: String, value: i64 },
}

// ─── Definitions ──────────────────────────────────────────────────────────────

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct BadgeDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub criteria: Criteria,
}

/// Return all defined badges, in display order.
///
/// This list is the canonical source of truth for the achievement
/// catalogue; [`seed_badge_catalog`] mirrors it into the `badges` table.
pub fn all_definitions() -> Vec<BadgeDef> {
    vec![
        BadgeDef {
            slug: FIRST_CONTRIBUTION,
            name: "First Contribution",
            description: "Published your first rule. Welcome aboard.",
            criteria: Criteria::Event {
                name: "first-publish".to_string(),
            },
        },
        BadgeDef {
            slug: TEN_UPVOTES,
            name: "Crowd Favorite",
            description: "One of your rules reached a net score of 10 upvotes.",
            criteria: Criteria::Threshold {
                metric: "net-votes".to_string(),
                value: 10,
            },
        },
        BadgeDef {
            slug: HUNDRED_COPIES,
            name: "Copied a Hundred Times",
            description: "One of your rules was copied 100 times.",
            criteria: Criteria::Threshold {
                metric: "copies".to_string(),
                value: 100,
            },
        },
        BadgeDef {
            slug: VERIFIED_AUTHOR,
            name: "Verified Author",
            description: "Identity verified by the RuleHub team.",
            criteria: Criteria::Event {
                name: "verification-granted".to_string(),
            },
        },
        BadgeDef {
            slug: TOP_10_WEEK,
            name: "Top 10 of the Week",
            description: "Placed in the weekly leaderboard's top 10.",
            criteria: Criteria::Event {
                name: "weekly-top-10".to_string(),
            },
        },
        BadgeDef {
            slug: STREAK_7,
            name: "Week-Long Streak",
            description: "Contributed on 7 consecutive days.",
            criteria: Criteria::Threshold {
                metric: "streak-days".to_string(),
                value: 7,
            },
        },
    ]
}

// ─── Seeding ──────────────────────────────────────────────────────────────────

/// Insert every catalog entry whose slug is not yet in the `badges`
/// table. Safe to run on every boot; returns the number newly inserted
/// (0 once the catalog is fully seeded).
pub async fn seed_badge_catalog(pool: &SqlitePool) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let mut inserted = 0usize;

    for def in all_definitions() {
        let criteria_json =
            serde_json::to_string(&def.criteria).context("serialise badge criteria")?;
        let rows_affected = sqlx::query(
            "INSERT OR IGNORE INTO badges (id, slug, name, description, criteria_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(def.slug)
        .bind(def.name)
        .bind(def.description)
        .bind(&criteria_json)
        .bind(&now)
        .execute(pool)
        .await
        .with_context(|| format!("seed badge {}", def.slug))?
        .rows_affected();
        inserted += rows_affected as usize;
    }

    Ok(inserted)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_six_badges_with_unique_slugs() {
        let defs = all_definitions();
        assert_eq!(defs.len(), 6);
        let slugs: HashSet<&str> = defs.iter().map(|d| d.slug).collect();
        assert_eq!(slugs.len(), 6);
        assert!(slugs.contains(FIRST_CONTRIBUTION));
        assert!(slugs.contains(STREAK_7));
    }

    #[test]
    fn criteria_json_is_tagged_and_roundtrips() {
        let c = Criteria::Threshold {
            metric: "copies".to_string(),
            value: 100,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "threshold");
        assert_eq!(json["metric"], "copies");
        let back: Criteria = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);

        let e = Criteria::Event {
            name: "first-publish".to_string(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(serde_json::from_value::<Criteria>(json).unwrap(), e);
    }

    #[test]
    fn threshold_badges_carry_reference_values() {
        let defs = all_definitions();
        let by_slug = |slug: &str| {
            defs.iter()
                .find(|d| d.slug == slug)
                .unwrap()
                .criteria
                .clone()
        };
        assert_eq!(
            by_slug(TEN_UPVOTES),
            Criteria::Threshold {
                metric: "net-votes".to_string(),
                value: 10
            }
        );
        assert_eq!(
            by_slug(HUNDRED_COPIES),
            Criteria::Threshold {
                metric: "copies".to_string(),
                value: 100
            }
        );
    }
}
