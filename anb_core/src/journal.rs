//! Journal of completed sessions.
//!
//! Completed sessions are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access. The journal feeds the history
//! view and CSV export; it is never read back into progress.

use crate::{Result, SessionRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for completed session records
pub trait SessionJournal {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;
}

/// JSONL-based journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionJournal for JsonlJournal {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended session {} to journal", record.id);
        Ok(())
    }
}

/// Read all session records from a journal file
///
/// Malformed lines (e.g. a partial write) are skipped with a warning.
pub fn read_records(path: &Path) -> Result<Vec<SessionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from journal", records.len());
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    pub(crate) fn record_at(
        pattern_id: &str,
        completed_at: DateTime<Utc>,
        quality: u32,
    ) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            pattern_id: pattern_id.into(),
            quick: false,
            started_at: completed_at - Duration::minutes(15),
            completed_at,
            duration_minutes: 15,
            quality,
            xp_earned: 125,
        }
    }

    #[test]
    fn test_append_and_read_single_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let record = record_at("standard_5_5", Utc::now(), 90);

        let mut journal = JsonlJournal::new(&path);
        journal.append(&record).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn test_append_multiple_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("sessions.jsonl");

        let mut journal = JsonlJournal::new(&path);
        for _ in 0..5 {
            journal
                .append(&record_at("beginner_4_4", Utc::now(), 88))
                .unwrap();
        }

        assert_eq!(read_records(&path).unwrap().len(), 5);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sessions.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal.append(&record_at("standard_5_5", Utc::now(), 90)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ invalid json }}").unwrap();
        write!(file, r#"{{"id":"00000000-0000-0000-0000-000000000000","pattern"#).unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 1);
    }
}
