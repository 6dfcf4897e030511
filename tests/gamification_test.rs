//! Achievement system integration tests.
//!
//! Tests cover:
//!   - catalog seeding idempotency
//!   - award ledger idempotency + audit trail + missing-slug handling
//!   - per-event checkers (first-contribution, ten-upvotes, hundred-copies,
//!     verified-author, seven-day streak)
//!   - the top-10 weekly bulk award
//!   - the recheck backfill sweep

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use ruleboard::config::EngineConfig;
use ruleboard::gamification::{
    award_top10_weekly_badges, award_verified_author, check_first_contribution,
    check_hundred_copies, check_seven_day_streak, check_ten_upvotes,
};
use ruleboard::Engine;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
}

async fn make_engine(dir: &TempDir) -> Engine {
    let db_path = dir.path().join("ruleboard_test.db");
    let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .expect("open test db");
    let mut config = EngineConfig::default();
    config.data_dir = dir.path().to_path_buf();
    let engine = Engine::from_pool(config, pool).await.expect("build engine");
    engine
        .storage()
        .ensure_platform_tables()
        .await
        .expect("create platform tables");
    engine
}

async fn add_user(pool: &SqlitePool, id: &str) {
    sqlx::query("INSERT INTO users (id, handle, display_name, avatar_url) VALUES (?, ?, ?, NULL)")
        .bind(id)
        .bind(format!("handle-{id}"))
        .bind(format!("User {id}"))
        .execute(pool)
        .await
        .unwrap();
}

async fn add_rule_at(pool: &SqlitePool, id: &str, author_id: &str, status: &str, created_at: &str) {
    sqlx::query(
        "INSERT INTO rules (id, slug, title, author_id, status, model, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
    )
    .bind(id)
    .bind(format!("slug-{id}"))
    .bind(format!("Rule {id}"))
    .bind(author_id)
    .bind(status)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
}

async fn add_rule(pool: &SqlitePool, id: &str, author_id: &str, status: &str) {
    add_rule_at(pool, id, author_id, status, "2026-07-01T00:00:00+00:00").await;
}

async fn add_vote_at(pool: &SqlitePool, rule_id: &str, user_id: &str, value: i64, created_at: &str) {
    sqlx::query(
        "INSERT INTO votes (id, rule_id, user_id, value, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(rule_id)
    .bind(user_id)
    .bind(value)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
}

async fn add_vote(pool: &SqlitePool, rule_id: &str, user_id: &str, value: i64) {
    add_vote_at(pool, rule_id, user_id, value, "2026-08-01T09:00:00+00:00").await;
}

async fn add_copies(pool: &SqlitePool, rule_id: &str, date: &str, copies: i64) {
    sqlx::query(
        "INSERT INTO rule_metrics_daily (rule_id, date, views, copies, saves, forks, votes, score)
         VALUES (?1, ?2, 1, ?3, 0, 0, 0, 0.0)",
    )
    .bind(rule_id)
    .bind(date)
    .bind(copies)
    .execute(pool)
    .await
    .unwrap();
}

async fn user_badge_count(pool: &SqlitePool, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_badges WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ─── Catalog seeding ──────────────────────────────────────────────────────────

#[tokio::test]
async fn seeding_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();

    assert_eq!(engine.seed_badge_catalog().await.unwrap(), 6);
    assert_eq!(engine.seed_badge_catalog().await.unwrap(), 0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM badges")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 6);

    let slugs: Vec<(String,)> = sqlx::query_as("SELECT slug FROM badges ORDER BY slug")
        .fetch_all(&pool)
        .await
        .unwrap();
    let slugs: Vec<&str> = slugs.iter().map(|(s,)| s.as_str()).collect();
    assert_eq!(
        slugs,
        [
            "first-contribution",
            "hundred-copies",
            "streak-7",
            "ten-upvotes",
            "top-10-week",
            "verified-author",
        ]
    );
}

// ─── Award ledger ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn awarding_twice_yields_true_then_false_and_one_row() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();

    let first = engine
        .award_if_eligible("u1", "first-contribution", None)
        .await;
    assert!(first.awarded);
    let notif = first.notification.expect("new award carries a notification");
    assert_eq!(notif.badge_slug, "first-contribution");
    assert_eq!(notif.user_id, "u1");

    let second = engine
        .award_if_eligible("u1", "first-contribution", None)
        .await;
    assert!(!second.awarded);
    assert!(second.notification.is_none());

    assert_eq!(user_badge_count(&pool, "u1").await, 1);
    assert_eq!(
        engine.ledger().badges_for_user("u1").await.unwrap(),
        vec!["first-contribution"]
    );
}

#[tokio::test]
async fn unknown_slug_is_a_silent_no_op() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();

    let outcome = engine.award_if_eligible("u1", "does-not-exist", None).await;
    assert!(!outcome.awarded);
    assert_eq!(user_badge_count(&pool, "u1").await, 0);
}

#[tokio::test]
async fn each_award_writes_exactly_one_audit_row() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();

    engine
        .award_if_eligible("u1", "ten-upvotes", Some(json!({ "netScore": 12 })))
        .await;
    // Duplicate attempt must not add a second audit row.
    engine
        .award_if_eligible("u1", "ten-upvotes", Some(json!({ "netScore": 15 })))
        .await;

    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT actor_id, action, metadata_json FROM audit_log")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows.len(), 1);
    let (actor, action, metadata) = &rows[0];
    assert_eq!(actor, "u1");
    assert_eq!(action, "badge.awarded");

    let metadata: serde_json::Value = serde_json::from_str(metadata).unwrap();
    assert_eq!(metadata["badgeSlug"], "ten-upvotes");
    assert_eq!(metadata["userId"], "u1");
    assert_eq!(metadata["badgeMetadata"]["netScore"], 12);
}

// ─── Checkers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_contribution_fires_only_at_exactly_one_published_rule() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    add_user(&pool, "u1").await;
    // A draft does not count as a contribution.
    add_rule(&pool, "r-draft", "u1", "draft").await;
    let outcome = check_first_contribution(&metrics, &ledger, "u1").await;
    assert!(!outcome.awarded);

    add_rule(&pool, "r1", "u1", "published").await;
    let outcome = check_first_contribution(&metrics, &ledger, "u1").await;
    assert!(outcome.awarded);

    // With two published rules the count is no longer 1; the ledger's
    // idempotency is what keeps the badge, not the predicate.
    add_rule(&pool, "r2", "u1", "published").await;
    let outcome = check_first_contribution(&metrics, &ledger, "u1").await;
    assert!(!outcome.awarded);
    assert_eq!(user_badge_count(&pool, "u1").await, 1);
}

#[tokio::test]
async fn ten_upvotes_awards_author_at_net_score_ten() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    add_user(&pool, "author").await;
    add_rule(&pool, "r1", "author", "published").await;

    // 11 up, 2 down ⇒ net 9: below threshold.
    for i in 0..11 {
        add_vote(&pool, "r1", &format!("up{i}"), 1).await;
    }
    add_vote(&pool, "r1", "down0", -1).await;
    add_vote(&pool, "r1", "down1", -1).await;
    let outcome = check_ten_upvotes(&metrics, &ledger, "r1").await;
    assert!(!outcome.awarded);

    // One more upvote ⇒ net 10.
    add_vote(&pool, "r1", "up11", 1).await;
    let outcome = check_ten_upvotes(&metrics, &ledger, "r1").await;
    assert!(outcome.awarded);
    assert_eq!(
        outcome.notification.unwrap().user_id,
        "author" // the badge goes to the rule's author, not the voter
    );

    // The audit metadata snapshots the net score at decision time.
    let (metadata,): (String,) =
        sqlx::query_as("SELECT metadata_json FROM audit_log WHERE actor_id = 'author'")
            .fetch_one(&pool)
            .await
            .unwrap();
    let metadata: serde_json::Value = serde_json::from_str(&metadata).unwrap();
    assert_eq!(metadata["badgeMetadata"]["netScore"], 10);
    assert_eq!(metadata["badgeMetadata"]["ruleId"], "r1");
}

#[tokio::test]
async fn hundred_copies_sums_across_all_daily_records() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    add_user(&pool, "author").await;
    add_rule(&pool, "r1", "author", "published").await;
    add_copies(&pool, "r1", "2026-06-01", 60).await;
    add_copies(&pool, "r1", "2026-07-15", 39).await;

    let outcome = check_hundred_copies(&metrics, &ledger, "r1").await;
    assert!(!outcome.awarded); // 99

    add_copies(&pool, "r1", "2026-08-06", 1).await;
    let outcome = check_hundred_copies(&metrics, &ledger, "r1").await;
    assert!(outcome.awarded);
    assert_eq!(
        engine.ledger().badges_for_user("author").await.unwrap(),
        vec!["hundred-copies"]
    );
}

#[tokio::test]
async fn verified_author_is_a_direct_award() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    engine.seed_badge_catalog().await.unwrap();
    let ledger = engine.ledger();

    let outcome = award_verified_author(&ledger, "u1").await;
    assert!(outcome.awarded);
    let outcome = award_verified_author(&ledger, "u1").await;
    assert!(!outcome.awarded);
}

#[tokio::test]
async fn seven_day_streak_requires_every_day() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    // A pool of other people's rules to vote on: votes are unique per
    // (rule, user), so each day's vote targets a different rule.
    add_user(&pool, "lib").await;
    for day in ["02", "03", "05", "06", "07"] {
        add_rule(&pool, &format!("t{day}"), "lib", "published").await;
    }

    // u1: activity on all 7 days ending 2026-08-07, mixing rule creation
    // and votes.
    add_user(&pool, "u1").await;
    add_rule_at(&pool, "r1", "u1", "published", "2026-08-01T08:00:00+00:00").await;
    add_rule_at(&pool, "r2", "u1", "published", "2026-08-04T08:00:00+00:00").await;
    for day in ["02", "03", "05", "06", "07"] {
        add_vote_at(&pool, &format!("t{day}"), "u1", 1, &format!("2026-08-{day}T10:00:00+00:00"))
            .await;
    }

    // u2: six of seven days (gap on 2026-08-04).
    add_user(&pool, "u2").await;
    add_rule_at(&pool, "r3", "u2", "published", "2026-08-01T08:00:00+00:00").await;
    for day in ["02", "03", "05", "06", "07"] {
        add_vote_at(&pool, &format!("t{day}"), "u2", 1, &format!("2026-08-{day}T10:00:00+00:00"))
            .await;
    }

    let outcome = check_seven_day_streak(&metrics, &ledger, "u1", test_now()).await;
    assert!(outcome.awarded);

    let outcome = check_seven_day_streak(&metrics, &ledger, "u2", test_now()).await;
    assert!(!outcome.awarded);
}

// ─── Bulk operations ──────────────────────────────────────────────────────────

#[tokio::test]
async fn top10_awards_authors_and_skips_unresolvable_rules() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    add_user(&pool, "a1").await;
    add_user(&pool, "a2").await;
    add_rule(&pool, "r1", "a1", "published").await;
    add_rule(&pool, "r2", "a2", "published").await;
    add_rule(&pool, "r3", "a1", "published").await; // same author as r1

    let ranked = vec![
        "r1".to_string(),
        "ghost".to_string(), // deleted since the snapshot, skipped
        "r2".to_string(),
        "r3".to_string(), // author already holds the badge
    ];
    let outcome = award_top10_weekly_badges(&metrics, &ledger, &ranked).await;
    assert_eq!(outcome.awarded, 2);
    assert_eq!(outcome.notifications.len(), 2);

    // The rank recorded for r2 is its board position (3), unaffected by
    // the skipped entry before it.
    let (metadata,): (String,) = sqlx::query_as(
        "SELECT metadata_json FROM audit_log WHERE actor_id = 'a2'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    let metadata: serde_json::Value = serde_json::from_str(&metadata).unwrap();
    assert_eq!(metadata["badgeMetadata"]["rank"], 3);
    assert_eq!(metadata["badgeMetadata"]["ruleId"], "r2");
}

#[tokio::test]
async fn top10_processes_at_most_ten_entries() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();
    let (metrics, ledger) = (engine.metrics(), engine.ledger());

    let mut ranked = Vec::new();
    for i in 0..12 {
        let user = format!("u{i}");
        let rule = format!("r{i}");
        add_user(&pool, &user).await;
        add_rule(&pool, &rule, &user, "published").await;
        ranked.push(rule);
    }

    let outcome = award_top10_weekly_badges(&metrics, &ledger, &ranked).await;
    assert_eq!(outcome.awarded, 10);
    assert_eq!(user_badge_count(&pool, "u10").await, 0);
    assert_eq!(user_badge_count(&pool, "u11").await, 0);
}

#[tokio::test]
async fn recheck_backfills_missed_badges() {
    let dir = TempDir::new().unwrap();
    let engine = make_engine(&dir).await;
    let pool = engine.storage().pool();
    engine.seed_badge_catalog().await.unwrap();

    add_user(&pool, "u1").await;
    add_rule(&pool, "ra", "u1", "published").await;
    add_rule(&pool, "rb", "u1", "published").await;
    add_rule(&pool, "rc", "u1", "published").await;

    // ra qualifies for ten-upvotes, rb for hundred-copies.
    for i in 0..10 {
        add_vote(&pool, "ra", &format!("v{i}"), 1).await;
    }
    add_copies(&pool, "rb", "2026-08-01", 100).await;

    let outcome = engine.recheck_user_badges("u1").await;
    // first-contribution does not fire: the count is 3, not 1.
    assert_eq!(outcome.awarded, 2);

    let mut slugs = engine.ledger().badges_for_user("u1").await.unwrap();
    slugs.sort();
    assert_eq!(slugs, vec!["hundred-copies", "ten-upvotes"]);

    // Sweeping again awards nothing new.
    let outcome = engine.recheck_user_badges("u1").await;
    assert_eq!(outcome.awarded, 0);
    assert!(outcome.notifications.is_empty());
}
