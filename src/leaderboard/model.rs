// SPDX-License-Identifier: MIT
//! Leaderboard data models — the ranked-entry payload persisted inside a
//! snapshot row and the page types returned by the read path.
//!
//! All JSON payloads are `camelCase` so the platform's API layer can pass
//! them through unmodified.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failed string → enum conversion from a DB column or CLI argument.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

// ─── Period ───────────────────────────────────────────────────────────────────

/// Ranking window family. Stored in the DB as its lowercase string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    /// All-time board. Aggregates with no date filter unless the
    /// configuration caps it.
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::All => "all",
        }
    }
}

impl FromStr for Period {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "all" => Ok(Period::All),
            other => Err(ParseError {
                kind: "period",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Scope ────────────────────────────────────────────────────────────────────

/// Leaderboard partition: the whole site, one tag, or one model.
///
/// The DB stores `(kind, reference)` in two columns, with `reference = ''`
/// for [`Scope::Global`]: SQLite UNIQUE indexes treat NULLs as distinct
/// rows, so the empty string is what makes the one-snapshot-per-day index
/// actually fire for the global board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    /// Rules carrying the given tag.
    Tag(String),
    /// Rules targeting the given model (e.g. `"claude"`, `"gpt-4"`).
    Model(String),
}

impl Scope {
    /// The scope kind stored in the `scope` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Tag(_) => "tag",
            Scope::Model(_) => "model",
        }
    }

    /// The scope reference, `None` for the global board.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Tag(r) | Scope::Model(r) => Some(r.as_str()),
        }
    }

    /// The `scope_ref` column value (`''` for global, see type docs).
    pub fn ref_column(&self) -> &str {
        self.reference().unwrap_or("")
    }

    /// Rebuild a scope from its two DB columns.
    pub fn from_columns(kind: &str, reference: &str) -> Result<Self, ParseError> {
        match kind {
            "global" => Ok(Scope::Global),
            "tag" => Ok(Scope::Tag(reference.to_string())),
            "model" => Ok(Scope::Model(reference.to_string())),
            other => Err(ParseError {
                kind: "scope kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reference() {
            Some(r) => write!(f, "{}:{}", self.kind(), r),
            None => f.write_str(self.kind()),
        }
    }
}

// ─── Author ───────────────────────────────────────────────────────────────────

/// Denormalised author reference embedded in each leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

// ─── Aggregate candidate ──────────────────────────────────────────────────────

/// One rule's summed window metrics: the aggregator's output, unordered
/// and unranked. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleAggregate {
    pub rule_id: String,
    pub slug: String,
    pub title: String,
    pub author: AuthorRef,
    /// `MAX(score)` across the window. The daily quality signal is opaque
    /// to this engine, it is never recomputed here.
    pub score: f64,
    pub views: i64,
    pub copies: i64,
    pub saves: i64,
    pub forks: i64,
    pub votes: i64,
}

// ─── Leaderboard entry ────────────────────────────────────────────────────────

/// One ranked row of a leaderboard.
///
/// `rank_delta` is computed at read time against the previous snapshot and
/// is never present in the persisted payload; `None` marks a new entrant
/// (deliberately distinct from `Some(0)` = "held position").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Dense rank, starting at 1 with no gaps.
    pub rank: i64,
    pub rule_id: String,
    pub slug: String,
    pub title: String,
    pub author: AuthorRef,
    pub score: f64,
    pub views: i64,
    pub copies: i64,
    pub saves: i64,
    pub forks: i64,
    pub votes: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rank_delta: Option<i64>,
}

// ─── Snapshot payload ─────────────────────────────────────────────────────────

/// Window/scope metadata stored alongside the entries in `rank_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankMeta {
    pub period: Period,
    pub scope: String,
    pub scope_ref: Option<String>,
    /// Window actually used for this computation. `None` = unbounded.
    pub window_days: Option<i64>,
    /// RFC 3339 timestamp of the computation that produced these entries.
    /// Refreshed on every same-day overwrite (unlike the row's
    /// `created_at`, which keeps the first write's time).
    pub generated_at: String,
}

/// The serialised blob stored in `leaderboard_snapshots.rank_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankPayload {
    pub entries: Vec<LeaderboardEntry>,
    pub meta: RankMeta,
}

// ─── Snapshot row ─────────────────────────────────────────────────────────────

/// One persisted snapshot row, as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: String,
    pub period: String,
    pub scope: String,
    pub scope_ref: String,
    /// UTC calendar day (`YYYY-MM-DD`) this row is bucketed under.
    pub day: String,
    pub rank_json: String,
    pub created_at: String,
}

impl SnapshotRow {
    /// Deserialise the ranked payload.
    pub fn payload(&self) -> Result<RankPayload> {
        serde_json::from_str(&self.rank_json).with_context(|| {
            format!(
                "corrupt rank payload in snapshot {} ({} {})",
                self.id, self.period, self.scope
            )
        })
    }
}

// ─── Read-path types ──────────────────────────────────────────────────────────

/// Page metadata returned by the reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub period: Period,
    pub scope: String,
    pub scope_ref: Option<String>,
    pub window_days: Option<i64>,
    pub generated_at: Option<String>,
    /// Size of the full snapshot, not of this page.
    pub total_entries: usize,
}

/// Cursor pagination state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    /// `rule_id` of the last entry in this page; present only when
    /// `has_more` is true.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_cursor: Option<String>,
}

/// One page of a leaderboard, as served to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub meta: PageMeta,
    pub pagination: Pagination,
}

/// Position of a single rule within the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankInfo {
    pub rank: i64,
    pub total_entries: usize,
    /// Percentile of this rank within the board, rounded to 2 decimals;
    /// see [`crate::leaderboard::rank::percentile`].
    pub percentile: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rank_delta: Option<i64>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
