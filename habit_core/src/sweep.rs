//! Scheduled recompute of every stored habit.
//!
//! Run once a day (cron, systemd timer) so that streaks roll forward even
//! for habits nobody touched: a day that concluded without progress or a
//! freeze has to reset the streak.
//!
//! The sweep holds the store's exclusive lock for its whole duration, so it
//! never interleaves with a progress or freeze update. Habits are independent
//! of each other and are recomputed on a bounded thread pool.

use crate::progression::{refresh_metrics, HabitRules};
use crate::{Error, HabitStore, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;

/// Outcome of one sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Habits recomputed
    pub habits: usize,
    /// Habits whose stored metrics changed
    pub changed: usize,
}

/// Recompute and persist the metrics of every habit in the store
pub fn recompute_all(
    store: &HabitStore,
    today: NaiveDate,
    now: DateTime<Utc>,
    rules: &HabitRules,
    workers: usize,
) -> Result<SweepReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("habit-sweep-{}", i))
        .build()
        .map_err(|e| Error::Config(format!("Failed to start sweep workers: {}", e)))?;

    let report = store.update(|habits| {
        let changed = pool.install(|| {
            habits
                .par_iter_mut()
                .map(|habit| {
                    let before = habit.metrics();
                    let after = refresh_metrics(habit, today, rules);
                    if after != before {
                        tracing::debug!(
                            habit = %habit.id,
                            "Metrics changed: streak {} -> {}, xp {} -> {}",
                            before.streak,
                            after.streak,
                            before.xp,
                            after.xp
                        );
                        habit.updated_at = now;
                        1
                    } else {
                        0
                    }
                })
                .sum::<usize>()
        });

        Ok(SweepReport {
            habits: habits.len(),
            changed,
        })
    })?;

    tracing::info!(
        "Sweep for {} recomputed {} habits ({} changed)",
        today,
        report.habits,
        report.changed
    );
    Ok(report)
}
