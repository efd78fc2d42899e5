//! CSV export of the session journal.

use crate::{Result, SessionRecord};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    pattern_id: String,
    quick: bool,
    started_at: String,
    completed_at: String,
    duration_minutes: u32,
    quality: u32,
    xp_earned: u64,
}

impl From<&SessionRecord> for CsvRow {
    fn from(record: &SessionRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            pattern_id: record.pattern_id.clone(),
            quick: record.quick,
            started_at: record.started_at.to_rfc3339(),
            completed_at: record.completed_at.to_rfc3339(),
            duration_minutes: record.duration_minutes,
            quality: record.quality,
            xp_earned: record.xp_earned,
        }
    }
}

/// Export every journaled session to a CSV file
///
/// The file is rewritten from scratch with a header row and synced to disk.
/// Returns the number of sessions exported. The journal itself is untouched.
pub fn export_csv(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = crate::journal::read_records(journal_path)?;

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    // Header only when there is nothing to export
    if records.is_empty() {
        writer.write_record([
            "id",
            "pattern_id",
            "quick",
            "started_at",
            "completed_at",
            "duration_minutes",
            "quality",
            "xp_earned",
        ])?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} sessions to {:?}", records.len(), csv_path);
    Ok(records.len())
}
