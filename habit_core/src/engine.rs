//! Metrics engine for computing streaks and XP.
//!
//! This module implements the recomputation of a habit's metrics:
//! - Group progress into periods (days, or ISO weeks for weekly habits)
//! - Walk back from the current period to find the running streak
//! - Scan the whole history for the longest run
//! - Award XP for every completed period
//!
//! The engine is pure. It reads a habit snapshot and a "today" in the
//! reference zone and returns fresh metrics; persisting them is the caller's
//! job.

use crate::calendar::{next_period, period_start, previous_period};
use crate::{
    Config, Frequency, Habit, HabitMetrics, PeriodProgress, PeriodStatus, PeriodSummary,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// XP awarded per completed period
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XpRules {
    pub base_per_period: u64,
    pub excess_bonus_per_unit: u64,
}

impl Default for XpRules {
    fn default() -> Self {
        Self {
            base_per_period: 10,
            excess_bonus_per_unit: 1,
        }
    }
}

impl XpRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_per_period: config.xp.base_per_period,
            excess_bonus_per_unit: config.xp.excess_bonus_per_unit,
        }
    }
}

/// Recompute streak, longest streak and XP for a habit as of `today`
///
/// ## Rules
///
/// 1. A period is **completed** when its summed count reaches the target.
/// 2. A day is **frozen** when it carries a freeze and is not completed.
///    Freezes only exist for daily habits; any stored on a weekly habit are
///    ignored.
/// 3. Walking back from the current period: completed periods count, frozen
///    periods keep the chain alive, the open current period is neutral, and
///    the first missed period ends the walk.
/// 4. A frozen period adds to a run only when completed periods sit on both
///    sides of it.
/// 5. The longest streak never drops below the stored value.
/// 6. XP is `base + excess * bonus` for every completed period.
pub fn recalculate(habit: &Habit, today: NaiveDate, xp: &XpRules) -> HabitMetrics {
    let ledger = PeriodLedger::build(habit, today);

    let streak = ledger.current_streak();
    let longest_streak = habit
        .longest_streak
        .max(ledger.longest_run())
        .max(streak);
    let xp = ledger.xp(xp);

    tracing::debug!(
        habit = %habit.id,
        streak,
        longest_streak,
        xp,
        "Recomputed habit metrics as of {}",
        today
    );

    HabitMetrics {
        streak,
        longest_streak,
        xp,
    }
}

/// Progress within the current period (today, or this ISO week)
pub fn period_progress(habit: &Habit, today: NaiveDate) -> PeriodProgress {
    let ledger = PeriodLedger::build(habit, today);
    let done = ledger.total(ledger.current);

    let percent = if habit.target == 0 {
        0.0
    } else {
        (done as f64 / f64::from(habit.target) * 100.0).clamp(0.0, 100.0)
    };

    PeriodProgress {
        period_start: ledger.current,
        done,
        target: habit.target,
        percent,
    }
}

/// Most periods `period_history` will return
pub const MAX_HISTORY_PERIODS: usize = 1_000;

/// The last `periods` periods ending with the current one, oldest first
///
/// At most `MAX_HISTORY_PERIODS` are returned, fewer at the start of the
/// representable calendar.
pub fn period_history(habit: &Habit, today: NaiveDate, periods: usize) -> Vec<PeriodSummary> {
    let ledger = PeriodLedger::build(habit, today);
    let periods = periods.min(MAX_HISTORY_PERIODS);

    let mut history = Vec::with_capacity(periods);
    let mut cursor = Some(ledger.current);
    while let Some(start) = cursor {
        if history.len() == periods {
            break;
        }
        history.push(PeriodSummary {
            start,
            done: ledger.total(start),
            status: ledger.status(start),
        });
        cursor = previous_period(ledger.frequency, start);
    }

    history.reverse();
    history
}

/// Status of the period containing `day`
pub fn status_on(habit: &Habit, day: NaiveDate, today: NaiveDate) -> PeriodStatus {
    let ledger = PeriodLedger::build(habit, today);
    ledger.status(period_start(habit.frequency, day))
}

/// Per-period view of a habit's history up to the current period
struct PeriodLedger {
    frequency: Frequency,
    target: u64,
    /// Period start -> summed count
    totals: BTreeMap<NaiveDate, u64>,
    frozen: BTreeSet<NaiveDate>,
    /// Start of the period containing today
    current: NaiveDate,
}

impl PeriodLedger {
    fn build(habit: &Habit, today: NaiveDate) -> Self {
        let frequency = habit.frequency;

        let mut totals = BTreeMap::new();
        for entry in habit.progress.iter().filter(|p| p.date <= today) {
            *totals
                .entry(period_start(frequency, entry.date))
                .or_insert(0u64) += u64::from(entry.count);
        }

        let frozen = match frequency {
            Frequency::Daily => habit
                .freezes
                .iter()
                .map(|f| f.date)
                .filter(|d| *d <= today)
                .collect(),
            Frequency::Weekly => {
                if !habit.freezes.is_empty() {
                    tracing::warn!(
                        habit = %habit.id,
                        "Ignoring {} freezes stored on a weekly habit",
                        habit.freezes.len()
                    );
                }
                BTreeSet::new()
            }
        };

        Self {
            frequency,
            target: u64::from(habit.target),
            totals,
            frozen,
            current: period_start(frequency, today),
        }
    }

    fn total(&self, start: NaiveDate) -> u64 {
        self.totals.get(&start).copied().unwrap_or(0)
    }

    fn is_completed(&self, start: NaiveDate) -> bool {
        self.totals
            .get(&start)
            .map_or(false, |&total| total >= self.target)
    }

    fn status(&self, start: NaiveDate) -> PeriodStatus {
        if start > self.current {
            PeriodStatus::Empty
        } else if self.is_completed(start) {
            PeriodStatus::Completed
        } else if self.frozen.contains(&start) {
            PeriodStatus::Frozen
        } else if start == self.current {
            PeriodStatus::Pending
        } else {
            PeriodStatus::Missed
        }
    }

    /// Run ending at the current period, walking backwards
    fn current_streak(&self) -> u32 {
        let mut streak = 0u32;
        // Frozen periods seen since the last completed one; credited only
        // once an older completed period closes the bridge.
        let mut bridge = 0u32;
        let mut cursor = Some(self.current);

        while let Some(start) = cursor {
            match self.status(start) {
                PeriodStatus::Completed => {
                    streak += bridge + 1;
                    bridge = 0;
                }
                PeriodStatus::Frozen => {
                    if streak > 0 {
                        bridge += 1;
                    }
                }
                PeriodStatus::Pending => {}
                PeriodStatus::Missed | PeriodStatus::Empty => break,
            }
            cursor = previous_period(self.frequency, start);
        }

        streak
    }

    /// Longest run anywhere in the history, scanning forwards
    ///
    /// Only periods with progress or a freeze are visited; any gap between
    /// two of them is a run of missed periods.
    fn longest_run(&self) -> u32 {
        let recorded: BTreeSet<NaiveDate> = self
            .totals
            .keys()
            .chain(self.frozen.iter())
            .copied()
            .collect();

        let mut best = 0u32;
        let mut run = 0u32;
        let mut bridge = 0u32;
        let mut previous: Option<NaiveDate> = None;

        for start in recorded {
            if let Some(prev) = previous {
                if next_period(self.frequency, prev) != Some(start) {
                    run = 0;
                    bridge = 0;
                }
            }
            previous = Some(start);

            match self.status(start) {
                PeriodStatus::Completed => {
                    run += bridge + 1;
                    bridge = 0;
                    best = best.max(run);
                }
                PeriodStatus::Frozen => {
                    if run > 0 {
                        bridge += 1;
                    }
                }
                PeriodStatus::Pending | PeriodStatus::Empty => {}
                PeriodStatus::Missed => {
                    run = 0;
                    bridge = 0;
                }
            }
        }

        best
    }

    fn xp(&self, rules: &XpRules) -> u64 {
        self.totals
            .values()
            .filter(|&&total| total >= self.target)
            .map(|&total| {
                let excess = total - self.target;
                rules
                    .base_per_period
                    .saturating_add(excess.saturating_mul(rules.excess_bonus_per_unit))
            })
            .fold(0u64, u64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FreezeDay, NewHabit, ProgressEntry};
    use chrono::{Duration, Utc};

    /// 2024-03-04 is a Monday
    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Duration::days(n)
    }

    fn habit(frequency: Frequency, target: u32) -> Habit {
        Habit::new(
            NewHabit {
                title: "Study".into(),
                category: None,
                frequency,
                target,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn with_progress(mut h: Habit, entries: &[(i64, u32)]) -> Habit {
        for &(d, count) in entries {
            h.progress.push(ProgressEntry { date: day(d), count });
        }
        h
    }

    fn with_freezes(mut h: Habit, days: &[i64]) -> Habit {
        for &d in days {
            h.freezes.push(FreezeDay { date: day(d) });
        }
        h
    }

    fn metrics(h: &Habit, today: i64) -> HabitMetrics {
        recalculate(h, day(today), &XpRules::default())
    }

    #[test]
    fn test_no_history_keeps_prior_longest() {
        let mut h = habit(Frequency::Daily, 1);
        h.longest_streak = 4;
        let m = metrics(&h, 0);
        assert_eq!(
            m,
            HabitMetrics {
                streak: 0,
                longest_streak: 4,
                xp: 0
            }
        );
    }

    #[test]
    fn test_consecutive_days() {
        let h = with_progress(habit(Frequency::Daily, 1), &[(0, 1), (1, 1)]);
        assert_eq!(metrics(&h, 1).streak, 2);
    }

    #[test]
    fn test_freeze_bridges_two_completed_days() {
        let h = with_freezes(
            with_progress(habit(Frequency::Daily, 1), &[(0, 1), (2, 1)]),
            &[1],
        );
        let m = metrics(&h, 2);
        assert_eq!(m.streak, 3);
        assert_eq!(m.longest_streak, 3);
    }

    #[test]
    fn test_missed_concluded_day_breaks_chain() {
        let h = with_progress(habit(Frequency::Daily, 1), &[(0, 1)]);
        assert_eq!(metrics(&h, 2).streak, 0);
    }

    #[test]
    fn test_open_today_does_not_break() {
        let h = with_progress(habit(Frequency::Daily, 1), &[(0, 1), (1, 1)]);
        // Evaluated on day 2 with nothing logged yet
        assert_eq!(metrics(&h, 2).streak, 2);
    }

    #[test]
    fn test_lone_freeze_gives_no_streak() {
        let h = with_freezes(habit(Frequency::Daily, 1), &[1]);
        assert_eq!(metrics(&h, 1).streak, 0);
        assert_eq!(metrics(&h, 2).streak, 0);
        assert_eq!(metrics(&h, 2).longest_streak, 0);
    }

    #[test]
    fn test_trailing_freeze_preserves_without_extending() {
        let h = with_freezes(
            with_progress(habit(Frequency::Daily, 1), &[(0, 1), (1, 1)]),
            &[2],
        );
        // Day 2 frozen, day 3 open: chain survives at its earlier length
        assert_eq!(metrics(&h, 3).streak, 2);
        // Day 3 concluded without progress or freeze
        assert_eq!(metrics(&h, 4).streak, 0);
    }

    #[test]
    fn test_completed_day_ignores_its_freeze() {
        let h = with_freezes(with_progress(habit(Frequency::Daily, 1), &[(0, 1)]), &[0]);
        let m = metrics(&h, 0);
        assert_eq!(m.streak, 1);
        assert_eq!(m.xp, 10);
    }

    #[test]
    fn test_partial_day_can_be_frozen() {
        let h = with_freezes(
            with_progress(habit(Frequency::Daily, 3), &[(0, 3), (1, 1), (2, 3)]),
            &[1],
        );
        assert_eq!(metrics(&h, 2).streak, 3);
    }

    #[test]
    fn test_target_boundary() {
        let below = with_progress(habit(Frequency::Daily, 3), &[(0, 2)]);
        let exact = with_progress(habit(Frequency::Daily, 3), &[(0, 3)]);
        let above = with_progress(habit(Frequency::Daily, 3), &[(0, 4)]);

        assert_eq!(metrics(&below, 0), HabitMetrics::default());
        assert_eq!(metrics(&exact, 0).streak, 1);
        assert_eq!(metrics(&exact, 0).xp, 10);
        assert_eq!(metrics(&above, 0).xp, 11);
    }

    #[test]
    fn test_xp_sums_all_completed_periods() {
        let h = with_progress(
            habit(Frequency::Daily, 2),
            &[(0, 2), (1, 5), (3, 1), (5, 2)],
        );
        // 10 + (10 + 3) + 0 + 10
        assert_eq!(metrics(&h, 5).xp, 33);
    }

    #[test]
    fn test_xp_rules_are_configurable() {
        let h = with_progress(habit(Frequency::Daily, 1), &[(0, 3)]);
        let rules = XpRules {
            base_per_period: 5,
            excess_bonus_per_unit: 2,
        };
        assert_eq!(recalculate(&h, day(0), &rules).xp, 9);
    }

    #[test]
    fn test_longest_streak_found_in_history() {
        let h = with_progress(
            habit(Frequency::Daily, 1),
            &[(0, 1), (1, 1), (2, 1), (3, 1), (5, 1), (6, 1)],
        );
        let m = metrics(&h, 6);
        assert_eq!(m.streak, 2);
        assert_eq!(m.longest_streak, 4);
    }

    #[test]
    fn test_longest_streak_is_monotonic() {
        let mut h = with_progress(habit(Frequency::Daily, 1), &[(0, 1), (1, 1), (2, 1)]);
        let before = metrics(&h, 2);
        h.set_metrics(before);
        assert_eq!(before.longest_streak, 3);

        // History shrinks; the stored best survives
        h.progress.retain(|p| p.date != day(1));
        let after = metrics(&h, 2);
        assert_eq!(after.streak, 1);
        assert_eq!(after.longest_streak, 3);
    }

    #[test]
    fn test_longest_at_least_streak() {
        let h = with_freezes(
            with_progress(habit(Frequency::Daily, 1), &[(0, 1), (2, 1), (3, 1)]),
            &[1],
        );
        let m = metrics(&h, 3);
        assert!(m.longest_streak >= m.streak);
        assert_eq!(m.streak, 4);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut h = with_freezes(
            with_progress(habit(Frequency::Daily, 2), &[(0, 2), (2, 3), (3, 1)]),
            &[1],
        );
        let first = metrics(&h, 3);
        assert_eq!(first, metrics(&h, 3));

        h.set_metrics(first);
        assert_eq!(first, metrics(&h, 3));
    }

    #[test]
    fn test_future_entries_ignored() {
        let h = with_progress(habit(Frequency::Daily, 1), &[(0, 1), (5, 1)]);
        assert_eq!(metrics(&h, 0).xp, 10);
    }

    #[test]
    fn test_weekly_same_week_completes() {
        // Mon: 2, Wed: 3 with target 5
        let h = with_progress(habit(Frequency::Weekly, 5), &[(0, 2), (2, 3)]);
        assert_eq!(metrics(&h, 2).streak, 1);
        assert_eq!(metrics(&h, 6).streak, 1);
        // Any day of the following week
        assert_eq!(metrics(&h, 7).streak, 1);
        assert_eq!(metrics(&h, 13).streak, 1);
        // Two weeks later the gap week has concluded
        assert_eq!(metrics(&h, 14).streak, 0);
        assert_eq!(metrics(&h, 14).longest_streak, 1);
    }

    #[test]
    fn test_weekly_split_across_weeks_completes_neither() {
        // Sunday and the following Monday
        let h = with_progress(habit(Frequency::Weekly, 3), &[(6, 1), (7, 2)]);
        let m = metrics(&h, 8);
        assert_eq!(m.streak, 0);
        assert_eq!(m.xp, 0);

        let together = with_progress(habit(Frequency::Weekly, 3), &[(5, 1), (6, 2)]);
        assert_eq!(metrics(&together, 8).streak, 1);
    }

    #[test]
    fn test_weekly_consecutive_weeks() {
        let h = with_progress(
            habit(Frequency::Weekly, 1),
            &[(0, 1), (8, 1), (16, 2)],
        );
        let m = metrics(&h, 16);
        assert_eq!(m.streak, 3);
        assert_eq!(m.xp, 31);
    }

    #[test]
    fn test_weekly_ignores_freezes() {
        crate::logging::init_test();
        let h = with_freezes(
            with_progress(habit(Frequency::Weekly, 1), &[(0, 1), (14, 1)]),
            &[7],
        );
        assert_eq!(metrics(&h, 14).streak, 1);
    }

    #[test]
    fn test_period_progress_daily() {
        let h = with_progress(habit(Frequency::Daily, 4), &[(0, 1), (1, 1)]);
        let p = period_progress(&h, day(1));
        assert_eq!(p.period_start, day(1));
        assert_eq!(p.done, 1);
        assert!((p.percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_period_progress_weekly_is_clamped() {
        let h = with_progress(habit(Frequency::Weekly, 2), &[(0, 2), (3, 3)]);
        let p = period_progress(&h, day(4));
        assert_eq!(p.period_start, day(0));
        assert_eq!(p.done, 5);
        assert!((p.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_period_history_states() {
        let h = with_freezes(
            with_progress(habit(Frequency::Daily, 2), &[(0, 2), (2, 1)]),
            &[1],
        );
        let history = period_history(&h, day(3), 5);
        let statuses: Vec<_> = history.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                PeriodStatus::Missed,
                PeriodStatus::Completed,
                PeriodStatus::Frozen,
                PeriodStatus::Missed,
                PeriodStatus::Pending,
            ]
        );
        assert_eq!(history[0].start, day(-1));
        assert_eq!(history[3].done, 1);
    }

    #[test]
    fn test_status_on_future_day_is_empty() {
        let h = habit(Frequency::Daily, 1);
        assert_eq!(status_on(&h, day(3), day(0)), PeriodStatus::Empty);
        assert_eq!(status_on(&h, day(0), day(0)), PeriodStatus::Pending);
    }

    #[test]
    fn test_ancient_entry_does_not_scan_calendar() {
        let ancient = NaiveDate::from_ymd_opt(-200_000, 1, 1).unwrap();
        let mut h = with_progress(habit(Frequency::Daily, 1), &[(-1, 1), (0, 1)]);
        h.progress.insert(0, ProgressEntry { date: ancient, count: 1 });

        let started = std::time::Instant::now();
        let m = metrics(&h, 0);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(
            m,
            HabitMetrics {
                streak: 2,
                longest_streak: 2,
                xp: 30,
            }
        );
    }

    #[test]
    fn test_longest_run_breaks_on_gaps() {
        // The freeze trailing the first run must not join it to the second
        // run across the empty day between them
        let h = with_freezes(
            with_progress(
                habit(Frequency::Daily, 1),
                &[(-10, 1), (-9, 1), (-8, 1), (-5, 1), (-3, 1)],
            ),
            &[-7, -4],
        );
        let m = metrics(&h, 0);
        assert_eq!(m.longest_streak, 3);
        assert_eq!(m.streak, 0);
    }

    #[test]
    fn test_period_history_is_capped() {
        let h = habit(Frequency::Weekly, 1);
        let history = period_history(&h, day(0), 20_000_000);
        assert_eq!(history.len(), MAX_HISTORY_PERIODS);
        assert_eq!(history.last().unwrap().start, day(0));
    }

    #[test]
    fn test_period_history_stops_at_calendar_start() {
        let h = habit(Frequency::Daily, 1);
        let history = period_history(&h, NaiveDate::MIN, 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].start, NaiveDate::MIN);
        assert_eq!(
            recalculate(&h, NaiveDate::MIN, &XpRules::default()),
            HabitMetrics::default()
        );
    }
}
