//! Habit persistence with file locking.
//!
//! All habits live in one JSON document. Every read-modify-write cycle runs
//! under an exclusive lock on a sidecar lock file, so two processes logging
//! progress on the same habit can never lose each other's update. Readers
//! take a shared lock. Writes go to a temp file that is synced and renamed
//! over the document.

use crate::{Error, Habit, NewHabit, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STORE_FILE: &str = "habits.json";
const LOCK_FILE: &str = "habits.lock";

/// On-disk document
#[derive(Debug, Deserialize)]
struct HabitDocument {
    #[serde(default)]
    habits: Vec<Habit>,
}

/// File-backed habit store
#[derive(Clone, Debug)]
pub struct HabitStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl HabitStore {
    /// Store rooted in `data_dir` (`habits.json` plus its lock file)
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            path: data_dir.join(STORE_FILE),
            lock_path: data_dir.join(LOCK_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (creating if needed) the lock file
    fn lock_file(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;
        Ok(file)
    }

    /// Load all habits under a shared lock
    ///
    /// Returns an empty list if the store doesn't exist yet.
    pub fn load(&self) -> Result<Vec<Habit>> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let result = self.read_unlocked();
        lock.unlock()?;
        result
    }

    fn read_unlocked(&self) -> Result<Vec<Habit>> {
        if !self.path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", self.path);
            return Ok(Vec::new());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(File::open(&self.path)?);
        reader.read_to_string(&mut contents)?;

        // A damaged store is never replaced with an empty one; the next
        // save would destroy whatever is still recoverable.
        let document: HabitDocument = serde_json::from_str(&contents).map_err(|e| {
            tracing::warn!("Failed to parse store {:?}: {}", self.path, e);
            Error::Store(format!("{} is not a valid habit store: {}", self.path.display(), e))
        })?;

        tracing::debug!("Loaded {} habits from {:?}", document.habits.len(), self.path);
        Ok(document.habits)
    }

    /// Atomically replace the store document
    ///
    /// 1. Write to a temp file in the same directory
    /// 2. Sync it to disk
    /// 3. Rename it over the original
    fn write_unlocked(&self, habits: &[Habit]) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Store(format!("store path {:?} has no parent", self.path))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, &StoreRef { habits })?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} habits to {:?}", habits.len(), self.path);
        Ok(())
    }

    /// Load, modify and save the whole store under an exclusive lock
    ///
    /// Nothing is written if `f` returns an error.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Habit>) -> Result<T>,
    {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let result = self.read_unlocked().and_then(|mut habits| {
            let value = f(&mut habits)?;
            self.write_unlocked(&habits)?;
            Ok(value)
        });

        lock.unlock()?;
        result
    }

    /// Add a new habit
    pub fn create(&self, new: NewHabit, now: DateTime<Utc>) -> Result<Habit> {
        let habit = Habit::new(new, now)?;
        let created = habit.clone();
        self.update(move |habits| {
            habits.push(habit);
            Ok(())
        })?;
        tracing::info!(habit = %created.id, "Created habit '{}'", created.title);
        Ok(created)
    }

    /// All habits, newest first
    pub fn list(&self) -> Result<Vec<Habit>> {
        let mut habits = self.load()?;
        habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(habits)
    }

    /// Look up a habit by full id or unique id prefix
    pub fn get(&self, key: &str) -> Result<Habit> {
        let habits = self.load()?;
        let idx = resolve(&habits, key)?;
        Ok(habits[idx].clone())
    }

    /// Run `f` on one habit and persist the result atomically
    ///
    /// The habit's `updated_at` is bumped only when `f` succeeds.
    pub fn modify<T, F>(&self, key: &str, now: DateTime<Utc>, f: F) -> Result<(Habit, T)>
    where
        F: FnOnce(&mut Habit) -> Result<T>,
    {
        self.update(|habits| {
            let idx = resolve(habits, key)?;
            let habit = &mut habits[idx];
            let value = f(habit)?;
            habit.updated_at = now;
            Ok((habit.clone(), value))
        })
    }

    /// Remove a habit, returning it
    pub fn delete(&self, key: &str) -> Result<Habit> {
        let removed = self.update(|habits| {
            let idx = resolve(habits, key)?;
            Ok(habits.remove(idx))
        })?;
        tracing::info!(habit = %removed.id, "Deleted habit '{}'", removed.title);
        Ok(removed)
    }
}

/// Borrowed form of the document for serialization without cloning
#[derive(Serialize)]
struct StoreRef<'a> {
    habits: &'a [Habit],
}

/// Index of the habit whose id equals or starts with `key`
fn resolve(habits: &[Habit], key: &str) -> Result<usize> {
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return Err(Error::Validation("habit id must not be empty".into()));
    }

    let matches: Vec<usize> = habits
        .iter()
        .enumerate()
        .filter(|(_, h)| h.id.to_string().starts_with(&key))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [idx] => Ok(*idx),
        [] => Err(Error::NotFound(key)),
        many => Err(Error::Validation(format!(
            "id prefix '{}' matches {} habits",
            key,
            many.len()
        ))),
    }
}
