//! Events emitted by the core to render, audio and persistence layers.

use crate::{Achievement, LiveMetrics, Nostril, Phase, SessionResult, UserProgress};
use serde::Serialize;

/// Severity of a user-facing notification
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Something that happened inside the core
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PhaseChanged {
        phase: Phase,
        nostril: Nostril,
    },
    CountdownTick {
        seconds_remaining: u32,
    },
    CycleCompleted {
        cycle_index: u32,
        total_cycles: u32,
    },
    SessionCompleted(SessionResult),
    ProgressChanged(UserProgress),
    AchievementUnlocked(Achievement),
    MetricsUpdated(LiveMetrics),
    Notify {
        message: String,
        severity: Severity,
    },
}

impl Event {
    pub fn notify(message: impl Into<String>, severity: Severity) -> Self {
        Event::Notify {
            message: message.into(),
            severity,
        }
    }
}

/// Event sink trait for subscribers of core events
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Collects events in order, mainly for tests and batch rendering
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}
