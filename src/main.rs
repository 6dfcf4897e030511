// SPDX-License-Identifier: MIT
//! ruleboard batch CLI — the external trigger surface for the engine.
//!
//! The platform invokes these subcommands from cron (snapshot recompute)
//! and from operational tooling (seeding, backfill). All ranking logic
//! lives in the library; this binary only parses arguments, reads the
//! wall clock once, and dispatches.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ruleboard::config::EngineConfig;
use ruleboard::gamification::{self, BadgeNotification};
use ruleboard::leaderboard::model::{Period, Scope};
use ruleboard::Engine;

#[derive(Parser)]
#[command(
    name = "ruleboard",
    about = "Leaderboard snapshot & achievement engine for RuleHub",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Data directory for config.toml and the SQLite database
    #[arg(long, env = "RULEBOARD_DATA_DIR", default_value = ".")]
    data_dir: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RULEBOARD_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute a leaderboard and persist it into today's snapshot bucket.
    ///
    /// Safe to run repeatedly: same-day runs overwrite the existing row.
    Snapshot {
        /// Board period: daily | weekly | monthly | all
        #[arg(long)]
        period: Period,

        /// Restrict the board to one tag
        #[arg(long, conflicts_with = "model")]
        tag: Option<String>,

        /// Restrict the board to one model
        #[arg(long)]
        model: Option<String>,

        /// After a weekly snapshot, award top-10-week badges to the
        /// board's top authors
        #[arg(long)]
        award_top10: bool,
    },
    /// Seed the badge catalog (no-op for already-present slugs).
    SeedBadges,
    /// Re-run the badge backfill sweep for one user.
    Recheck {
        /// User id to sweep
        #[arg(long)]
        user: String,
    },
    /// Award the verified-author badge (called when verification is granted).
    VerifyAuthor {
        /// User id that passed verification
        #[arg(long)]
        user: String,
    },
    /// Print one page of the current leaderboard as JSON.
    Show {
        /// Board period: daily | weekly | monthly | all
        #[arg(long)]
        period: Period,

        /// Restrict the board to one tag
        #[arg(long, conflicts_with = "model")]
        tag: Option<String>,

        /// Restrict the board to one model
        #[arg(long)]
        model: Option<String>,

        /// Resume after this rule id
        #[arg(long)]
        cursor: Option<String>,

        /// Page size (defaults to the configured page_size)
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn scope_from_args(tag: Option<String>, model: Option<String>) -> Scope {
    match (tag, model) {
        (Some(t), _) => Scope::Tag(t),
        (None, Some(m)) => Scope::Model(m),
        (None, None) => Scope::Global,
    }
}

/// Fire-and-forget dispatch: the engine hands pending notifications back
/// to its caller, and in the batch CLI that dispatch is a log line. A
/// dropped notification never affects the award itself.
fn dispatch_notifications(notifications: &[BadgeNotification]) {
    for n in notifications {
        info!(
            user_id = %n.user_id,
            badge = %n.badge_slug,
            "badge awarded: {}",
            n.badge_name
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| {
            tracing_subscriber::EnvFilter::try_new(args.log.as_deref().unwrap_or("info"))
        })
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EngineConfig::load(&args.data_dir);
    let engine = Engine::open(config).await?;
    let now = Utc::now();

    match args.command {
        Command::Snapshot {
            period,
            tag,
            model,
            award_top10,
        } => {
            let scope = scope_from_args(tag, model);
            let (id, count) = engine.refresh_snapshot(period, scope.clone(), now).await?;
            info!(%period, %scope, snapshot_id = %id, entries = count, "snapshot upserted");

            if award_top10 {
                if period != Period::Weekly {
                    warn!(%period, "--award-top10 only applies to the weekly board, skipping");
                } else {
                    let page = engine
                        .read_leaderboard(period, &scope, None, Some(10))
                        .await?;
                    let top_ids: Vec<String> =
                        page.entries.iter().map(|e| e.rule_id.clone()).collect();
                    let outcome = gamification::award_top10_weekly_badges(
                        &engine.metrics(),
                        &engine.ledger(),
                        &top_ids,
                    )
                    .await;
                    info!(awarded = outcome.awarded, "top-10 weekly badges processed");
                    dispatch_notifications(&outcome.notifications);
                }
            }
        }
        Command::SeedBadges => {
            let inserted = engine.seed_badge_catalog().await?;
            info!(inserted, "badge catalog seeded");
        }
        Command::Recheck { user } => {
            let outcome = engine.recheck_user_badges(&user).await;
            info!(user_id = %user, awarded = outcome.awarded, "recheck sweep complete");
            dispatch_notifications(&outcome.notifications);
        }
        Command::VerifyAuthor { user } => {
            let outcome =
                gamification::award_verified_author(&engine.ledger(), &user).await;
            info!(user_id = %user, awarded = outcome.awarded, "verified-author processed");
            dispatch_notifications(outcome.notification.as_slice());
        }
        Command::Show {
            period,
            tag,
            model,
            cursor,
            limit,
        } => {
            let scope = scope_from_args(tag, model);
            let page = engine
                .read_leaderboard(period, &scope, cursor.as_deref(), limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }

    Ok(())
}
