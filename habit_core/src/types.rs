//! Core domain types for habit tracking.
//!
//! This module defines the fundamental types used throughout the system:
//! - Habits, their cadence and target
//! - Progress entries and freeze days
//! - Computed metrics (streak, longest streak, XP)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Cadence
// ============================================================================

/// Cadence unit a habit is measured in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// One calendar day in the reference zone
    Daily,
    /// One ISO week, Monday to Sunday
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => f.write_str("daily"),
            Frequency::Weekly => f.write_str("weekly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(crate::Error::Validation(format!(
                "unknown frequency '{}', expected daily or weekly",
                other
            ))),
        }
    }
}

// ============================================================================
// History entries
// ============================================================================

/// Units logged on one calendar day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEntry {
    pub date: NaiveDate,
    pub count: u32,
}

/// A calendar day protected from breaking the streak
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreezeDay {
    pub date: NaiveDate,
}

// ============================================================================
// Habit aggregate
// ============================================================================

/// A tracked habit together with its history and last computed metrics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub frequency: Frequency,
    pub target: u32,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    #[serde(default)]
    pub freezes: Vec<FreezeDay>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub xp: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn default_category() -> String {
    "General".to_string()
}

impl Habit {
    /// Build a fresh habit with empty history and zero metrics
    pub fn new(new: NewHabit, now: DateTime<Utc>) -> crate::Result<Self> {
        new.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            category: new
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(default_category),
            frequency: new.frequency,
            target: new.target,
            progress: Vec::new(),
            freezes: Vec::new(),
            streak: 0,
            longest_streak: 0,
            xp: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Count logged on a given day, if any
    pub fn progress_on(&self, date: NaiveDate) -> Option<u32> {
        self.progress
            .iter()
            .find(|p| p.date == date)
            .map(|p| p.count)
    }

    pub fn is_frozen(&self, date: NaiveDate) -> bool {
        self.freezes.iter().any(|f| f.date == date)
    }

    /// Metrics currently stored on the habit
    pub fn metrics(&self) -> HabitMetrics {
        HabitMetrics {
            streak: self.streak,
            longest_streak: self.longest_streak,
            xp: self.xp,
        }
    }

    /// Store freshly computed metrics on the habit
    pub fn set_metrics(&mut self, metrics: HabitMetrics) {
        self.streak = metrics.streak;
        self.longest_streak = metrics.longest_streak;
        self.xp = metrics.xp;
    }
}

/// Input for creating a habit
#[derive(Clone, Debug)]
pub struct NewHabit {
    pub title: String,
    pub category: Option<String>,
    pub frequency: Frequency,
    pub target: u32,
}

impl NewHabit {
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::Validation("title must not be empty".into()));
        }
        validate_target(self.target)
    }
}

/// Editable habit fields; `None` leaves a field unchanged
#[derive(Clone, Debug, Default)]
pub struct HabitPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub target: Option<u32>,
}

pub(crate) fn validate_target(target: u32) -> crate::Result<()> {
    if target < 1 {
        return Err(crate::Error::Validation(format!(
            "target must be at least 1, got {}",
            target
        )));
    }
    Ok(())
}

// ============================================================================
// Computed metrics
// ============================================================================

/// Result of a metrics recomputation
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitMetrics {
    pub streak: u32,
    pub longest_streak: u32,
    pub xp: u64,
}

/// Derived state of one period, as seen from "today"
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Period has not started yet
    Empty,
    /// Current period, still open and not yet completed or frozen
    Pending,
    Completed,
    Frozen,
    Missed,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodStatus::Empty => "empty",
            PeriodStatus::Pending => "pending",
            PeriodStatus::Completed => "completed",
            PeriodStatus::Frozen => "frozen",
            PeriodStatus::Missed => "missed",
        };
        f.write_str(s)
    }
}

/// One period of a habit's history
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodSummary {
    pub start: NaiveDate,
    pub done: u64,
    pub status: PeriodStatus,
}

/// Progress towards the target within the current period
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PeriodProgress {
    pub period_start: NaiveDate,
    pub done: u64,
    pub target: u32,
    pub percent: f64,
}
