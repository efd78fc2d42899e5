#![forbid(unsafe_code)]

//! Core domain model and session logic for the alternate-nostril breathing
//! coach.
//!
//! This crate provides:
//! - Domain types (patterns, phases, metrics, progress, achievements)
//! - Pattern catalog
//! - Session orchestrator (tick-driven phase state machine)
//! - Quality scoring and progression rules
//! - Persistence (progress store, session journal, CSV export)
//! - The `Coach` host tying them together

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod cycles;
pub mod events;
pub mod orchestrator;
pub mod quality;
pub mod progression;
pub mod store;
pub mod journal;
pub mod history;
pub mod export;
pub mod coach;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, PatternCatalog};
pub use config::Config;
pub use events::{Event, EventSink, Severity};
pub use orchestrator::{SessionOrchestrator, SessionState};
pub use store::{FileStore, MemoryStore, ProgressStore};
pub use journal::{JsonlJournal, SessionJournal};
pub use history::{daily_summary, load_recent_records, DaySummary};
pub use export::export_csv;
pub use coach::Coach;
