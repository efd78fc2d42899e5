//! Built-in breathing patterns and achievements.
//!
//! Patterns are immutable and looked up by id. Unknown ids resolve to the
//! default pattern rather than failing.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Pattern used when a requested id is unknown
pub const DEFAULT_PATTERN_ID: &str = "standard_5_5";

/// Pattern used by quick sessions
pub const QUICK_PATTERN_ID: &str = "quick_4_4";

/// Pattern used by the recommended session
pub const RECOMMENDED_PATTERN_ID: &str = "advanced_6_6";

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<PatternCatalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static PatternCatalog {
    &DEFAULT_CATALOG
}

/// The table of breathing patterns known to the coach
#[derive(Clone, Debug)]
pub struct PatternCatalog {
    pub patterns: HashMap<String, Pattern>,
    /// Fallback for unknown ids
    pub default: Pattern,
}

impl PatternCatalog {
    /// Look up a pattern by id
    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    /// Look up a pattern, falling back to the default pattern for unknown ids
    pub fn resolve(&self, id: &str) -> &Pattern {
        if let Some(pattern) = self.patterns.get(id) {
            return pattern;
        }

        tracing::warn!(
            "Unknown pattern '{}', falling back to '{}'",
            id,
            self.default.id
        );
        &self.default
    }

    /// Patterns ordered by difficulty, then XP value
    pub fn sorted(&self) -> Vec<&Pattern> {
        let mut patterns: Vec<_> = self.patterns.values().collect();
        patterns.sort_by_key(|p| (p.difficulty, p.xp_value, p.id.clone()));
        patterns
    }

    /// Validate the catalog, returning a list of problems (empty when valid)
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.patterns.get(&self.default.id) != Some(&self.default) {
            errors.push(format!(
                "Default pattern '{}' is not in the catalog",
                self.default.id
            ));
        }

        for (id, pattern) in &self.patterns {
            if id != &pattern.id {
                errors.push(format!(
                    "Pattern key '{}' does not match pattern id '{}'",
                    id, pattern.id
                ));
            }
            if pattern.inhale_seconds == 0 {
                errors.push(format!("Pattern '{}': inhale must be positive", id));
            }
            if pattern.exhale_seconds == 0 {
                errors.push(format!("Pattern '{}': exhale must be positive", id));
            }
            if !(1..=4).contains(&pattern.difficulty) {
                errors.push(format!(
                    "Pattern '{}': difficulty {} outside 1..=4",
                    id, pattern.difficulty
                ));
            }
        }

        errors
    }
}

fn pattern(
    id: &str,
    name: &str,
    description: &str,
    difficulty: u8,
    (inhale, hold, exhale): (u32, u32, u32),
    xp_value: u32,
    optimal_duration_minutes: u32,
) -> Pattern {
    Pattern {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        difficulty,
        inhale_seconds: inhale,
        hold_seconds: hold,
        exhale_seconds: exhale,
        xp_value,
        optimal_duration_minutes,
    }
}

/// Builds the default catalog with the built-in breathing patterns
///
/// **Note**: prefer `get_default_catalog()`, which returns a cached reference.
pub fn build_default_catalog() -> PatternCatalog {
    let patterns = vec![
        pattern(
            QUICK_PATTERN_ID,
            "Quick Focus",
            "Rapid centering technique for immediate calm",
            1,
            (4, 0, 4),
            25,
            1,
        ),
        pattern(
            "beginner_4_4",
            "Foundation",
            "Perfect for building ANB fundamentals",
            1,
            (4, 0, 4),
            50,
            5,
        ),
        pattern(
            DEFAULT_PATTERN_ID,
            "Balanced Flow",
            "Harmonious breathing for deep balance",
            2,
            (5, 0, 5),
            75,
            15,
        ),
        pattern(
            RECOMMENDED_PATTERN_ID,
            "Deep Harmony",
            "Advanced pattern for profound states",
            3,
            (6, 0, 6),
            100,
            20,
        ),
        pattern(
            "master_4_7_8",
            "Master's Breath",
            "Ultimate relaxation with retention",
            4,
            (4, 7, 8),
            150,
            25,
        ),
    ];

    let patterns: HashMap<_, _> = patterns
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();
    let default = patterns[DEFAULT_PATTERN_ID].clone();

    PatternCatalog { patterns, default }
}

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    xp_reward: u64,
    rarity: Rarity,
) -> Achievement {
    Achievement {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        xp_reward,
        rarity,
        earned: false,
    }
}

/// The built-in achievement list, nothing earned
pub fn default_achievements() -> Vec<Achievement> {
    vec![
        achievement(
            "first_session",
            "First Breath",
            "Complete your inaugural ANB session",
            100,
            Rarity::Common,
        ),
        achievement(
            "perfect_posture_week",
            "Postural Perfection",
            "Practice 7 days in a row",
            500,
            Rarity::Rare,
        ),
        achievement(
            "mindful_eyes_master",
            "Unwavering Focus",
            "Keep eyes closed for entire session 20 times",
            300,
            Rarity::Uncommon,
        ),
        achievement(
            "rhythm_master",
            "Perfect Timing",
            "Achieve a 95+ session quality",
            750,
            Rarity::Epic,
        ),
        achievement(
            "consistency_champion",
            "Dedication Embodied",
            "Practice daily for 30 consecutive days",
            1500,
            Rarity::Legendary,
        ),
    ]
}
