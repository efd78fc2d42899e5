//! Progress persistence with file locking.
//!
//! The store is a plain key-value collaborator: the core owns the schema of
//! the three records (progress, achievements, settings), the store only keeps
//! their serialized text. Loading never fails: absent or malformed records
//! fall back to defaults with a warning.

use crate::catalog::default_achievements;
use crate::{Achievement, Error, Result, Settings, UserProgress};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Record key of the user progress aggregate
pub const PROGRESS_KEY: &str = "progress";

/// Record key of the achievement list
pub const ACHIEVEMENTS_KEY: &str = "achievements";

/// Record key of the settings map
pub const SETTINGS_KEY: &str = "settings";

/// Durable key-value storage for serialized records
pub trait ProgressStore {
    /// Read a record, `Ok(None)` when it has never been written
    fn load_record(&self, key: &str) -> Result<Option<String>>;

    /// Write a record, replacing any previous value
    fn save_record(&mut self, key: &str, contents: &str) -> Result<()>;
}

/// One JSON file per record inside a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing a record
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ProgressStore for FileStore {
    fn load_record(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        tracing::debug!("Read record '{}' from {:?}", key, path);
        Ok(Some(contents))
    }

    /// Atomically writes a record by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn save_record(&mut self, key: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.record_path(key);

        let temp = NamedTempFile::new_in(&self.dir)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved record '{}' to {:?}", key, path);
        Ok(())
    }
}

/// In-memory store, used by tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, String>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail, to exercise error reporting
    pub fn failing() -> Self {
        Self {
            records: HashMap::new(),
            fail_saves: true,
        }
    }

    pub fn insert(&mut self, key: &str, contents: &str) {
        self.records.insert(key.to_string(), contents.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }
}

impl ProgressStore for MemoryStore {
    fn load_record(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn save_record(&mut self, key: &str, contents: &str) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Store(format!("record '{}' is read-only", key)));
        }
        self.records.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Load a record, falling back to defaults when absent or unreadable
///
/// Records are merged shallowly over defaults by the types' `#[serde(default)]`
/// attributes: missing keys keep their default, unknown keys are ignored.
pub fn load_or_default<T>(store: &dyn ProgressStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match store.load_record(key) {
        Ok(Some(contents)) => contents,
        Ok(None) => {
            tracing::info!("No '{}' record found, using defaults", key);
            return T::default();
        }
        Err(e) => {
            tracing::warn!("Unable to read '{}' record: {}. Using defaults.", key, e);
            return T::default();
        }
    };

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse '{}' record: {}. Using defaults.", key, e);
            T::default()
        }
    }
}

/// Serialize and save a record
pub fn save<T: Serialize>(store: &mut dyn ProgressStore, key: &str, value: &T) -> Result<()> {
    // Compact JSON, the records are not meant for hand editing
    let contents = serde_json::to_string(value)?;
    store.save_record(key, &contents)
}

pub fn load_progress(store: &dyn ProgressStore) -> UserProgress {
    load_or_default(store, PROGRESS_KEY)
}

pub fn load_settings(store: &dyn ProgressStore) -> Settings {
    load_or_default(store, SETTINGS_KEY)
}

/// Load the achievement list, merged by id over the built-in list
///
/// Only the `earned` flag of a stored entry is kept; entries for unknown ids
/// are dropped so the built-in names and rewards stay authoritative.
pub fn load_achievements(store: &dyn ProgressStore) -> Vec<Achievement> {
    let stored: Vec<StoredAchievement> = load_or_default(store, ACHIEVEMENTS_KEY);
    let mut achievements = default_achievements();

    for entry in stored {
        match achievements.iter_mut().find(|a| a.id == entry.id) {
            Some(achievement) => achievement.earned |= entry.earned,
            None => tracing::debug!("Ignoring unknown stored achievement '{}'", entry.id),
        }
    }

    achievements
}

/// The subset of a stored achievement the merge relies on
#[derive(serde::Deserialize)]
struct StoredAchievement {
    id: String,
    #[serde(default)]
    earned: bool,
}
