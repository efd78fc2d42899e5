//! Core domain types for the breathing coach.
//!
//! This module defines the fundamental types used throughout the system:
//! - Breathing patterns and session configuration
//! - Phases and nostrils of the alternate-nostril cycle
//! - Live sensor metrics
//! - User progress, achievements and settings
//! - Journal records of completed sessions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Pattern Types
// ============================================================================

/// A breathing pattern (e.g., "Balanced Flow" 5:5)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub difficulty: u8,
    pub inhale_seconds: u32,
    /// Breath retention after the inhale, 0 when the pattern has none
    pub hold_seconds: u32,
    pub exhale_seconds: u32,
    pub xp_value: u32,
    pub optimal_duration_minutes: u32,
}

impl Pattern {
    /// Whether the pattern includes a retention phase
    pub fn has_hold(&self) -> bool {
        self.hold_seconds > 0
    }

    /// Number of phase transitions that make up one full cycle
    ///
    /// A cycle runs the pattern once per nostril: inhale/exhale (2 phases)
    /// or inhale/hold/exhale (3 phases), twice.
    pub fn breaths_per_cycle(&self) -> u32 {
        if self.has_hold() {
            6
        } else {
            4
        }
    }

    /// Length of one full cycle (both nostrils) in seconds
    pub fn cycle_seconds(&self) -> u32 {
        2 * (self.inhale_seconds + self.hold_seconds + self.exhale_seconds)
    }

    /// Short ratio label, e.g. "4:7:8" or "5:5"
    pub fn ratio_label(&self) -> String {
        if self.has_hold() {
            format!(
                "{}:{}:{}",
                self.inhale_seconds, self.hold_seconds, self.exhale_seconds
            )
        } else {
            format!("{}:{}", self.inhale_seconds, self.exhale_seconds)
        }
    }
}

/// Parameters of a requested session, consumed once at start
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub pattern: Pattern,
    pub duration_minutes: u32,
    pub is_quick_mode: bool,
}

// ============================================================================
// Phase Types
// ============================================================================

/// Phase of a practice session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Preparing,
    Inhale,
    Hold,
    Exhale,
    Complete,
}

impl Phase {
    /// True for inhale, hold and exhale
    pub fn is_breathing(&self) -> bool {
        matches!(self, Phase::Inhale | Phase::Hold | Phase::Exhale)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Preparing => "Preparation",
            Phase::Inhale => "Inhale",
            Phase::Hold => "Hold",
            Phase::Exhale => "Exhale",
            Phase::Complete => "Complete",
        }
    }
}

/// The nostril currently open for breathing
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Nostril {
    Left,
    Right,
}

impl Nostril {
    pub fn flipped(self) -> Self {
        match self {
            Nostril::Left => Nostril::Right,
            Nostril::Right => Nostril::Left,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Nostril::Left => "Left",
            Nostril::Right => "Right",
        }
    }
}

// ============================================================================
// Metric Types
// ============================================================================

/// One reading from the external metrics feed, each value in [0, 100]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MetricsReading {
    pub posture: f64,
    pub eye_closure: f64,
    pub head_stability: f64,
    pub breath_rhythm: f64,
}

/// Live metrics shown during practice
///
/// `confidence` and `session_quality` are derived and never fed directly.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LiveMetrics {
    pub posture: f64,
    pub eye_closure: f64,
    pub head_stability: f64,
    pub breath_rhythm: f64,
    pub confidence: u32,
    pub session_quality: u32,
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self {
            posture: 92.0,
            eye_closure: 98.0,
            head_stability: 89.0,
            breath_rhythm: 94.0,
            confidence: 85,
            session_quality: 0,
        }
    }
}

// ============================================================================
// Progress Types
// ============================================================================

/// User's durable progress aggregate
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserProgress {
    pub level: u32,
    pub xp: u64,
    pub xp_to_next_level: u64,
    pub total_sessions: u32,
    pub total_minutes: u64,
    pub current_streak: u32,
    pub avg_quality: f64,
    pub wellness_score: u32,
    /// Local date of the most recent completed session (streak anchor)
    pub last_session_date: Option<NaiveDate>,
    /// Sessions finished with the eyes closed throughout
    pub eyes_closed_sessions: u32,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            xp_to_next_level: crate::progression::level_threshold(1),
            total_sessions: 0,
            total_minutes: 0,
            current_streak: 0,
            avg_quality: 0.0,
            wellness_score: 0,
            last_session_date: None,
            eyes_closed_sessions: 0,
        }
    }
}

/// Achievement rarity tier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// An unlockable achievement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub xp_reward: u64,
    pub rarity: Rarity,
    #[serde(default)]
    pub earned: bool,
}

/// User preferences persisted next to progress
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub posture_sensitivity: u8,
    pub eye_sensitivity: u8,
    pub master_volume: u8,
    pub voice_guidance: bool,
    pub breathing_sounds: bool,
    pub smart_recommendations: bool,
    pub adaptive_difficulty: bool,
    pub daily_challenges: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            posture_sensitivity: 7,
            eye_sensitivity: 8,
            master_volume: 75,
            voice_guidance: true,
            breathing_sounds: true,
            smart_recommendations: true,
            adaptive_difficulty: true,
            daily_challenges: true,
        }
    }
}

// ============================================================================
// Session Outcome Types
// ============================================================================

/// Summary of a completed session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionResult {
    pub quality_score: u32,
    pub duration_minutes: u32,
    pub xp_earned: u64,
}

/// A completed session as recorded in the journal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub pattern_id: String,
    #[serde(default)]
    pub quick: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub quality: u32,
    pub xp_earned: u64,
}
