use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use habit_core::progression::refresh_metrics;
use habit_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "habits")]
#[command(about = "Habit streak and XP tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat this day (YYYY-MM-DD) as today
    #[arg(long, global = true)]
    today: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a habit
    New {
        #[arg(long)]
        title: String,

        /// daily or weekly
        #[arg(long, default_value = "daily")]
        frequency: String,

        /// Units needed per day (or per week)
        #[arg(long, default_value_t = 1)]
        target: u32,

        #[arg(long)]
        category: Option<String>,
    },

    /// List habits with their current metrics (default)
    List,

    /// Show a habit's recent periods
    Show {
        id: String,

        /// Number of periods to show
        #[arg(
            long,
            default_value_t = 14,
            value_parser = clap::value_parser!(u16).range(1..=MAX_HISTORY_PERIODS as i64)
        )]
        periods: u16,
    },

    /// Log progress (defaults to 1 unit today)
    Log {
        id: String,

        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        count: i64,
    },

    /// Remove the progress logged on a day
    Unmark {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Freeze a day to protect the streak (daily habits only)
    Freeze {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Remove a freeze
    Unfreeze {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Change title, category or target
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        target: Option<u32>,
    },

    /// Delete a habit
    Delete { id: String },

    /// Recompute every habit's metrics (run daily from cron)
    Sweep,

    /// Export habits and metrics as CSV
    Export {
        /// Output file (defaults to <data-dir>/habits.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Everything a command needs
struct App {
    store: HabitStore,
    zone: ReferenceZone,
    rules: HabitRules,
    data_dir: PathBuf,
    workers: usize,
    today: NaiveDate,
    now: DateTime<Utc>,
}

impl App {
    fn day_or_today(&self, date: Option<String>) -> Result<NaiveDate> {
        match date {
            Some(d) => self.zone.parse_day(&d),
            None => Ok(self.today),
        }
    }
}

fn main() -> ExitCode {
    habit_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_rejection() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let zone = ReferenceZone::from_config(&config)?;
    let now = Utc::now();
    let today = match cli.today {
        Some(ref d) => zone.parse_day(d)?,
        None => zone.today(now),
    };

    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Data dir {:?}, today is {}", data_dir, today);
    let app = App {
        store: HabitStore::open(&data_dir),
        zone,
        rules: HabitRules::from_config(&config),
        data_dir,
        workers: config.sweep.workers,
        today,
        now,
    };

    match cli.command {
        Some(Commands::New {
            title,
            frequency,
            target,
            category,
        }) => cmd_new(&app, title, &frequency, target, category),
        Some(Commands::List) | None => cmd_list(&app),
        Some(Commands::Show { id, periods }) => cmd_show(&app, &id, periods),
        Some(Commands::Log { id, date, count }) => cmd_log(&app, &id, date, count),
        Some(Commands::Unmark { id, date }) => cmd_unmark(&app, &id, date),
        Some(Commands::Freeze { id, date }) => cmd_freeze(&app, &id, date),
        Some(Commands::Unfreeze { id, date }) => cmd_unfreeze(&app, &id, date),
        Some(Commands::Edit {
            id,
            title,
            category,
            target,
        }) => cmd_edit(&app, &id, HabitPatch { title, category, target }),
        Some(Commands::Delete { id }) => cmd_delete(&app, &id),
        Some(Commands::Sweep) => cmd_sweep(&app),
        Some(Commands::Export { out }) => cmd_export(&app, out),
    }
}

fn cmd_new(
    app: &App,
    title: String,
    frequency: &str,
    target: u32,
    category: Option<String>,
) -> Result<()> {
    let frequency: Frequency = frequency.parse()?;
    let habit = app.store.create(
        NewHabit {
            title,
            category,
            frequency,
            target,
        },
        app.now,
    )?;

    println!("✓ Created habit {}", habit.id);
    println!(
        "  {} [{}] {}, target {}",
        habit.title, habit.category, habit.frequency, habit.target
    );
    Ok(())
}

fn cmd_list(app: &App) -> Result<()> {
    let habits = app.store.list()?;
    if habits.is_empty() {
        println!("No habits yet. Create one with `habits new --title ...`.");
        return Ok(());
    }

    for habit in &habits {
        // Read-only view: recomputed for today, not written back
        let metrics = recalculate(habit, app.today, &app.rules.xp);
        let progress = period_progress(habit, app.today);
        println!(
            "{}  {:<24} {:<6}  {}/{} ({:.0}%)  {}",
            short_id(habit),
            habit.title,
            habit.frequency,
            progress.done,
            progress.target,
            progress.percent,
            format_metrics(&metrics)
        );
    }
    Ok(())
}

fn cmd_show(app: &App, id: &str, periods: u16) -> Result<()> {
    let habit = app.store.get(id)?;
    let metrics = recalculate(&habit, app.today, &app.rules.xp);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", habit.title);
    println!("╰─────────────────────────────────────────╯");
    println!("  id:        {}", habit.id);
    println!("  category:  {}", habit.category);
    println!("  cadence:   {}, target {}", habit.frequency, habit.target);
    println!("  {}", format_metrics(&metrics));
    println!();

    for period in period_history(&habit, app.today, usize::from(periods)) {
        println!(
            "  {}  {} {:>4}  {}",
            period.start,
            status_marker(period.status),
            period.done,
            period.status
        );
    }
    println!();
    Ok(())
}

fn cmd_log(app: &App, id: &str, date: Option<String>, count: i64) -> Result<()> {
    let date = app.day_or_today(date)?;
    let (habit, metrics) = app.store.modify(id, app.now, |h| {
        add_progress(h, date, count, app.today, &app.rules)
    })?;

    println!("✓ Logged {} for '{}' on {}", count, habit.title, date);
    print_day_status(app, &habit, date);
    println!("  {}", format_metrics(&metrics));
    Ok(())
}

fn cmd_unmark(app: &App, id: &str, date: Option<String>) -> Result<()> {
    let date = app.day_or_today(date)?;
    let (habit, metrics) = app.store.modify(id, app.now, |h| {
        Ok(remove_progress(h, date, app.today, &app.rules))
    })?;

    println!("✓ Unmarked '{}' on {}", habit.title, date);
    print_day_status(app, &habit, date);
    println!("  {}", format_metrics(&metrics));
    Ok(())
}

fn cmd_freeze(app: &App, id: &str, date: Option<String>) -> Result<()> {
    let date = app.day_or_today(date)?;
    let (habit, metrics) = app
        .store
        .modify(id, app.now, |h| add_freeze(h, date, app.today, &app.rules))?;

    println!("✓ Froze '{}' on {}", habit.title, date);
    print_day_status(app, &habit, date);
    println!("  {}", format_metrics(&metrics));
    Ok(())
}

fn cmd_unfreeze(app: &App, id: &str, date: Option<String>) -> Result<()> {
    let date = app.day_or_today(date)?;
    let (habit, metrics) = app.store.modify(id, app.now, |h| {
        Ok(remove_freeze(h, date, app.today, &app.rules))
    })?;

    println!("✓ Removed freeze on {} for '{}'", date, habit.title);
    print_day_status(app, &habit, date);
    println!("  {}", format_metrics(&metrics));
    Ok(())
}

fn cmd_edit(app: &App, id: &str, patch: HabitPatch) -> Result<()> {
    let (habit, metrics) = app
        .store
        .modify(id, app.now, |h| apply_patch(h, patch, app.today, &app.rules))?;

    println!("✓ Updated '{}'", habit.title);
    println!(
        "  [{}] {}, target {}",
        habit.category, habit.frequency, habit.target
    );
    println!("  {}", format_metrics(&metrics));
    Ok(())
}

fn cmd_delete(app: &App, id: &str) -> Result<()> {
    let habit = app.store.delete(id)?;
    println!("✓ Deleted '{}'", habit.title);
    Ok(())
}

fn cmd_sweep(app: &App) -> Result<()> {
    let report = recompute_all(&app.store, app.today, app.now, &app.rules, app.workers)?;
    println!(
        "✓ Recomputed {} habits for {} ({} changed)",
        report.habits, app.today, report.changed
    );
    Ok(())
}

fn cmd_export(app: &App, out: Option<PathBuf>) -> Result<()> {
    let path = out.unwrap_or_else(|| app.data_dir.join("habits.csv"));

    let mut habits = app.store.list()?;
    for habit in habits.iter_mut() {
        refresh_metrics(habit, app.today, &app.rules);
    }

    let count = write_metrics_csv(&habits, app.today, &path)?;
    println!("✓ Exported {} habits", count);
    println!("  CSV: {}", path.display());
    Ok(())
}

fn print_day_status(app: &App, habit: &Habit, date: NaiveDate) {
    let status = status_on(habit, date, app.today);
    println!("  {} {}: {}", status_marker(status), date, status);
}

fn short_id(habit: &Habit) -> String {
    habit.id.to_string()[..8].to_string()
}

fn format_metrics(metrics: &HabitMetrics) -> String {
    format!(
        "streak {} · best {} · xp {}",
        metrics.streak, metrics.longest_streak, metrics.xp
    )
}

fn status_marker(status: PeriodStatus) -> &'static str {
    match status {
        PeriodStatus::Completed => "■",
        PeriodStatus::Frozen => "❄",
        PeriodStatus::Pending => "…",
        PeriodStatus::Missed => "·",
        PeriodStatus::Empty => " ",
    }
}
