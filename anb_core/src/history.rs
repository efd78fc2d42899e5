//! Session history for the analytics view.
//!
//! Loads recent records from the journal and summarizes them per day.

use crate::{Result, SessionRecord};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::path::Path;

/// Longest history window offered, in days
pub const MAX_HISTORY_DAYS: u32 = 3650;

/// Aggregate of one calendar day of practice
#[derive(Clone, Debug, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub sessions: u32,
    pub minutes: u32,
    /// Mean quality of the day's sessions, `None` on days without practice
    pub avg_quality: Option<f64>,
}

/// Load sessions completed within the last `days` days
///
/// Returns records sorted by completion time (newest first). A window
/// reaching past the representable date range includes every record.
pub fn load_recent_records(
    journal_path: &Path,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<SessionRecord>> {
    let cutoff = Duration::try_days(days).and_then(|window| now.checked_sub_signed(window));

    let mut records: Vec<_> = crate::journal::read_records(journal_path)?
        .into_iter()
        .filter(|r| cutoff.map_or(true, |cutoff| r.completed_at >= cutoff))
        .collect();

    records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    tracing::info!(
        "Loaded {} sessions from last {} days",
        records.len(),
        days
    );
    Ok(records)
}

/// Per-day summary for the `days` days ending on `today`, oldest first
///
/// Days without sessions are included with zero counts. Records are bucketed
/// by their local completion date. The window is capped at [`MAX_HISTORY_DAYS`].
pub fn daily_summary(records: &[SessionRecord], days: u32, today: NaiveDate) -> Vec<DaySummary> {
    (0..days.min(MAX_HISTORY_DAYS))
        .rev()
        .filter_map(|offset| today.checked_sub_signed(Duration::days(i64::from(offset))))
        .map(|date| {
            let day: Vec<_> = records
                .iter()
                .filter(|r| r.completed_at.with_timezone(&Local).date_naive() == date)
                .collect();

            let sessions = day.len() as u32;
            let minutes = day.iter().map(|r| r.duration_minutes).sum();
            let avg_quality = if day.is_empty() {
                None
            } else {
                let total: u32 = day.iter().map(|r| r.quality).sum();
                Some(f64::from(total) / f64::from(sessions))
            };

            DaySummary {
                date,
                sessions,
                minutes,
                avg_quality,
            }
        })
        .collect()
}
