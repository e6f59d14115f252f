//! Scheduler processors — one bounded, non-aborting batch decision procedure
//! per notification category, plus receipt reconciliation.
//!
//! Common shape: query a bounded candidate set, compute per-recipient
//! variables, construct a dedupe key at the exact re-send granularity, and
//! hand each candidate to the gatekeeper. A per-recipient failure is counted
//! as skipped and never aborts the remaining batch; a failed candidate query
//! fails the whole run and the next tick retries it from current state.

pub mod daily_digest;
pub mod deferred;
pub mod game_reminders;
pub mod inactivity;
pub mod leaderboard;
pub mod receipts;
pub mod slip_expiring;
pub mod weekly_recap;
pub mod win_streak;
