//! Progress logging and freeze management for a single habit.
//!
//! Each helper validates its input before touching the habit, so a rejected
//! call leaves the habit exactly as it was. On success the habit is mutated,
//! its metrics are recomputed and written back, and the fresh metrics are
//! returned for the caller to persist.

use crate::calendar::{month_label, same_month};
use crate::engine::{recalculate, XpRules};
use crate::types::validate_target;
use crate::{
    Config, Error, FreezeDay, Frequency, Habit, HabitMetrics, HabitPatch, ProgressEntry, Result,
};
use chrono::NaiveDate;

/// Limits and scoring applied when mutating habits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HabitRules {
    pub monthly_freeze_quota: u32,
    pub xp: XpRules,
}

impl Default for HabitRules {
    fn default() -> Self {
        Self {
            monthly_freeze_quota: 2,
            xp: XpRules::default(),
        }
    }
}

impl HabitRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            monthly_freeze_quota: config.freeze.monthly_quota,
            xp: XpRules::from_config(config),
        }
    }
}

/// Recompute metrics and store them on the habit
pub fn refresh_metrics(habit: &mut Habit, today: NaiveDate, rules: &HabitRules) -> HabitMetrics {
    let metrics = recalculate(habit, today, &rules.xp);
    habit.set_metrics(metrics);
    metrics
}

/// Log `count` units on `date`
///
/// Counts logged on the same day accumulate into one entry.
pub fn add_progress(
    habit: &mut Habit,
    date: NaiveDate,
    count: i64,
    today: NaiveDate,
    rules: &HabitRules,
) -> Result<HabitMetrics> {
    let count = u32::try_from(count).map_err(|_| {
        Error::Validation(format!("count must be between 0 and {}, got {}", u32::MAX, count))
    })?;

    if date > today {
        return Err(Error::Validation(format!(
            "cannot log progress for {}, which is after today ({})",
            date, today
        )));
    }

    if habit.is_frozen(date) {
        return Err(Error::FrozenDay(date));
    }

    match habit.progress.iter_mut().find(|p| p.date == date) {
        Some(entry) => {
            entry.count = entry.count.checked_add(count).ok_or_else(|| {
                Error::Validation(format!("count on {} would overflow", date))
            })?;
        }
        None => {
            let idx = habit.progress.partition_point(|p| p.date < date);
            habit.progress.insert(idx, ProgressEntry { date, count });
        }
    }

    tracing::info!(habit = %habit.id, "Logged {} on {}", count, date);
    Ok(refresh_metrics(habit, today, rules))
}

/// Remove the progress entry for `date`, if there is one
pub fn remove_progress(
    habit: &mut Habit,
    date: NaiveDate,
    today: NaiveDate,
    rules: &HabitRules,
) -> HabitMetrics {
    let before = habit.progress.len();
    habit.progress.retain(|p| p.date != date);

    if habit.progress.len() < before {
        tracing::info!(habit = %habit.id, "Removed progress on {}", date);
    } else {
        tracing::debug!(habit = %habit.id, "No progress on {} to remove", date);
    }

    refresh_metrics(habit, today, rules)
}

/// Protect `date` from breaking the streak
///
/// Rejected for weekly habits, for days that already meet the target and
/// once the month's allowance is used. Freezing an already frozen day
/// changes nothing and uses no allowance.
pub fn add_freeze(
    habit: &mut Habit,
    date: NaiveDate,
    today: NaiveDate,
    rules: &HabitRules,
) -> Result<HabitMetrics> {
    if habit.frequency != Frequency::Daily {
        return Err(Error::UnsupportedOperation(format!(
            "freezes are only available for daily habits, '{}' is {}",
            habit.title, habit.frequency
        )));
    }

    if let Some(count) = habit.progress_on(date) {
        if count >= habit.target {
            return Err(Error::Conflict(format!(
                "{} already meets the target ({} of {})",
                date, count, habit.target
            )));
        }
    }

    if habit.is_frozen(date) {
        tracing::debug!(habit = %habit.id, "{} is already frozen", date);
        return Ok(refresh_metrics(habit, today, rules));
    }

    let used = habit
        .freezes
        .iter()
        .filter(|f| same_month(f.date, date))
        .count();
    if used >= rules.monthly_freeze_quota as usize {
        return Err(Error::QuotaExceeded {
            month: month_label(date),
            quota: rules.monthly_freeze_quota,
        });
    }

    let idx = habit.freezes.partition_point(|f| f.date < date);
    habit.freezes.insert(idx, FreezeDay { date });

    tracing::info!(
        habit = %habit.id,
        "Froze {} ({} of {} used this month)",
        date,
        used + 1,
        rules.monthly_freeze_quota
    );
    Ok(refresh_metrics(habit, today, rules))
}

/// Remove the freeze on `date`, if there is one
pub fn remove_freeze(
    habit: &mut Habit,
    date: NaiveDate,
    today: NaiveDate,
    rules: &HabitRules,
) -> HabitMetrics {
    let before = habit.freezes.len();
    habit.freezes.retain(|f| f.date != date);

    if habit.freezes.len() < before {
        tracing::info!(habit = %habit.id, "Removed freeze on {}", date);
    }

    refresh_metrics(habit, today, rules)
}

/// Edit title, category or target
pub fn apply_patch(
    habit: &mut Habit,
    patch: HabitPatch,
    today: NaiveDate,
    rules: &HabitRules,
) -> Result<HabitMetrics> {
    if let Some(ref title) = patch.title {
        if title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".into()));
        }
    }
    if let Some(target) = patch.target {
        validate_target(target)?;
    }

    if let Some(title) = patch.title {
        habit.title = title.trim().to_string();
    }
    if let Some(category) = patch.category {
        let category = category.trim();
        habit.category = if category.is_empty() {
            crate::types::default_category()
        } else {
            category.to_string()
        };
    }
    if let Some(target) = patch.target {
        if target != habit.target {
            tracing::info!(habit = %habit.id, "Target changed {} -> {}", habit.target, target);
        }
        habit.target = target;
    }

    Ok(refresh_metrics(habit, today, rules))
}
