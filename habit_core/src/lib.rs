#![forbid(unsafe_code)]

//! Core domain model and business logic for habit tracking.
//!
//! This crate provides:
//! - Domain types (habits, progress, freezes, metrics)
//! - Calendar normalization in a fixed reference zone
//! - Metrics engine (streak, longest streak, XP)
//! - Validated progress and freeze mutations
//! - Persistence (locked JSON store) and the daily recompute sweep
//! - CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod calendar;
pub mod engine;
pub mod progression;
pub mod store;
pub mod sweep;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use calendar::ReferenceZone;
pub use engine::{
    period_history, period_progress, recalculate, status_on, XpRules, MAX_HISTORY_PERIODS,
};
pub use progression::{
    add_freeze, add_progress, apply_patch, remove_freeze, remove_progress, HabitRules,
};
pub use store::HabitStore;
pub use sweep::{recompute_all, SweepReport};
pub use export::write_metrics_csv;
