// SPDX-License-Identifier: MIT
//! Achievement system — badge catalog, eligibility checkers, and the
//! idempotent award ledger.
//!
//! Badges are one-shot and permanent: once awarded they are never revoked,
//! even if the metric that triggered them later drops back below its
//! threshold (vote retractions do not un-earn `ten-upvotes`).

pub mod catalog;
pub mod checkers;
pub mod ledger;

pub use catalog::{all_definitions, seed_badge_catalog, Criteria};
pub use checkers::{
    award_top10_weekly_badges, award_verified_author, check_first_contribution,
    check_hundred_copies, check_seven_day_streak, check_ten_upvotes, recheck_user_badges,
};
pub use ledger::{AwardLedger, AwardOutcome, BadgeNotification, BulkAwardOutcome};
