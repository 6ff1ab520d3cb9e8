//! CSV export of habits and their metrics.

use crate::engine::period_progress;
use crate::{Habit, Result};
use chrono::NaiveDate;
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    title: String,
    category: String,
    frequency: String,
    target: u32,
    streak: u32,
    longest_streak: u32,
    xp: u64,
    period_done: u64,
    period_percent: String,
}

impl CsvRow {
    fn new(habit: &Habit, today: NaiveDate) -> Self {
        let progress = period_progress(habit, today);
        CsvRow {
            id: habit.id.to_string(),
            title: habit.title.clone(),
            category: habit.category.clone(),
            frequency: habit.frequency.to_string(),
            target: habit.target,
            streak: habit.streak,
            longest_streak: habit.longest_streak,
            xp: habit.xp,
            period_done: progress.done,
            period_percent: format!("{:.0}", progress.percent),
        }
    }
}

/// Write one row per habit to `path`, replacing any existing file
///
/// Returns the number of habits written. The file is synced to disk before
/// returning.
pub fn write_metrics_csv(habits: &[Habit], today: NaiveDate, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(File::create(path)?);

    for habit in habits {
        writer.serialize(CsvRow::new(habit, today))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} habits to {:?}", habits.len(), path);
    Ok(habits.len())
}
