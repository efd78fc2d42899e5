//! Progression rules applied when a session completes.
//!
//! This module turns a finished session into experience and progress:
//! - XP award from pattern, quality, duration and mode
//! - Leveling against a fixed threshold table (one level per check)
//! - Daily streak and wellness score
//! - Achievement unlocks, whose XP can trigger a second level check

use crate::{Achievement, Pattern, SessionResult, UserProgress};
use chrono::NaiveDate;

/// Cumulative XP needed to leave each level, indexed by level
pub const LEVEL_THRESHOLDS: [u64; 7] = [0, 500, 1500, 3500, 7500, 15000, 30000];

const LEVEL_NAMES: [&str; 7] = [
    "Novice",
    "Mindful Practitioner",
    "Balanced Seeker",
    "Harmony Master",
    "Zen Adept",
    "Breath Sage",
    "ANB Enlightened",
];

/// Final eye-closure score at which a session counts as eyes-closed
pub const EYES_CLOSED_SCORE: f64 = 90.0;

/// XP threshold for the given level
///
/// Past the end of the table the last increment repeats, so level 7 needs
/// 45000 XP, level 8 needs 60000, and so on.
pub fn level_threshold(level: u32) -> u64 {
    let idx = level as usize;
    let last = LEVEL_THRESHOLDS.len() - 1;
    if idx <= last {
        return LEVEL_THRESHOLDS[idx];
    }
    let step = LEVEL_THRESHOLDS[last] - LEVEL_THRESHOLDS[last - 1];
    LEVEL_THRESHOLDS[last] + step * (idx - last) as u64
}

/// Display name for a level
pub fn level_name(level: u32) -> &'static str {
    level
        .checked_sub(1)
        .and_then(|i| LEVEL_NAMES.get(i as usize))
        .copied()
        .unwrap_or("Master")
}

/// XP awarded for a completed session
///
/// `duration_minutes` is the requested duration, not the time actually spent.
pub fn xp_earned(
    pattern: &Pattern,
    session_quality: u32,
    duration_minutes: u32,
    is_quick_mode: bool,
) -> u64 {
    let base = u64::from(pattern.xp_value);
    let quality_bonus = u64::from(session_quality.saturating_sub(80)) * 2;
    let duration_bonus = u64::from(duration_minutes / 5) * 10;
    let quick_bonus = if is_quick_mode { 25 } else { 0 };

    base + quality_bonus + duration_bonus + quick_bonus
}

/// Level up once if the XP total has reached the current threshold
///
/// Returns true when a level was gained. Never gains more than one level,
/// even if the XP would cover several thresholds.
pub fn check_level_up(progress: &mut UserProgress) -> bool {
    if progress.xp < progress.xp_to_next_level {
        return false;
    }

    progress.level += 1;
    progress.xp_to_next_level = level_threshold(progress.level);
    tracing::info!(
        "Level up: now level {} ({}), next at {} XP",
        progress.level,
        level_name(progress.level),
        progress.xp_to_next_level
    );
    true
}

/// Record a completed session's totals and XP, leveling at most once
pub fn apply_completion(progress: &mut UserProgress, session_minutes: u32, xp: u64) -> bool {
    progress.total_sessions += 1;
    progress.total_minutes += u64::from(session_minutes);
    progress.xp += xp;
    check_level_up(progress)
}

/// Fold a session's quality into the running average (one decimal)
pub fn update_average_quality(progress: &mut UserProgress, session_quality: u32) {
    let n = f64::from(progress.total_sessions.max(1));
    let avg = (progress.avg_quality * (n - 1.0) + f64::from(session_quality)) / n;
    progress.avg_quality = (avg * 10.0).round() / 10.0;
}

/// Update the daily streak for a session completed on `today`
///
/// Same day: unchanged. Day after the last session: +1. Otherwise: reset to 1.
pub fn update_streak(progress: &mut UserProgress, today: NaiveDate) {
    match progress.last_session_date {
        Some(last) if last == today => return,
        Some(last) if today.pred_opt() == Some(last) => {
            progress.current_streak += 1;
        }
        _ => {
            progress.current_streak = 1;
        }
    }
    progress.last_session_date = Some(today);
    tracing::debug!("Streak is now {} days", progress.current_streak);
}

/// Recompute the wellness score from quality, streak and session count
pub fn update_wellness(progress: &mut UserProgress, session_quality: u32) {
    let streak_bonus = f64::from((progress.current_streak * 2).min(20));
    let consistency_bonus = f64::from(progress.total_sessions.min(30));

    let wellness =
        f64::from(session_quality) * 0.4 + streak_bonus * 0.3 + consistency_bonus * 0.3;
    progress.wellness_score = (wellness.round() as u32).min(100);
}

fn achievement_rule_met(id: &str, progress: &UserProgress, session_quality: u32) -> bool {
    match id {
        "first_session" => progress.total_sessions == 1,
        "perfect_posture_week" => progress.current_streak >= 7,
        "mindful_eyes_master" => progress.eyes_closed_sessions >= 20,
        "rhythm_master" => session_quality >= 95,
        "consistency_champion" => progress.current_streak >= 30,
        _ => false,
    }
}

/// Unlock every achievement whose rule now holds
///
/// Each unlock flips `earned` and adds its XP reward. Already earned
/// achievements are skipped, so repeated evaluation grants nothing twice.
/// Returns the newly unlocked achievements.
pub fn evaluate_achievements(
    progress: &mut UserProgress,
    achievements: &mut [Achievement],
    session_quality: u32,
) -> Vec<Achievement> {
    let mut unlocked = Vec::new();

    for achievement in achievements.iter_mut() {
        if achievement.earned {
            continue;
        }
        if !achievement_rule_met(&achievement.id, progress, session_quality) {
            continue;
        }

        achievement.earned = true;
        progress.xp += achievement.xp_reward;
        tracing::info!(
            "Achievement unlocked: {} (+{} XP)",
            achievement.name,
            achievement.xp_reward
        );
        unlocked.push(achievement.clone());
    }

    unlocked
}

/// Everything known about a session at the moment it completes
#[derive(Clone, Debug)]
pub struct CompletedSession<'a> {
    pub pattern: &'a Pattern,
    pub session_quality: u32,
    /// Requested duration, used for the XP bonus
    pub duration_minutes: u32,
    /// Whole minutes actually spent
    pub session_minutes: u32,
    pub is_quick_mode: bool,
    /// Final eye-closure reading
    pub eye_closure: f64,
    /// Local date of completion
    pub today: NaiveDate,
}

/// Result of applying a completed session to the user's progress
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOutcome {
    pub result: SessionResult,
    pub levels_gained: u32,
    pub unlocked: Vec<Achievement>,
}

/// Apply every progression rule for a completed session, in order
pub fn complete_session(
    progress: &mut UserProgress,
    achievements: &mut [Achievement],
    session: &CompletedSession<'_>,
) -> CompletionOutcome {
    let xp = xp_earned(
        session.pattern,
        session.session_quality,
        session.duration_minutes,
        session.is_quick_mode,
    );

    let mut levels_gained = 0;
    if apply_completion(progress, session.session_minutes, xp) {
        levels_gained += 1;
    }
    update_average_quality(progress, session.session_quality);
    update_streak(progress, session.today);
    update_wellness(progress, session.session_quality);

    if session.eye_closure >= EYES_CLOSED_SCORE {
        progress.eyes_closed_sessions += 1;
    }

    let unlocked = evaluate_achievements(progress, achievements, session.session_quality);
    if !unlocked.is_empty() && check_level_up(progress) {
        levels_gained += 1;
    }

    CompletionOutcome {
        result: SessionResult {
            quality_score: session.session_quality,
            duration_minutes: session.session_minutes,
            xp_earned: xp,
        },
        levels_gained,
        unlocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_achievements, get_default_catalog};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn level_three() -> UserProgress {
        UserProgress {
            level: 3,
            xp: 2250,
            xp_to_next_level: 3500,
            ..UserProgress::default()
        }
    }

    #[test]
    fn test_xp_earned_standard_session() {
        let pattern = get_default_catalog().resolve("standard_5_5");
        // 75 + (90 - 80) * 2 + 3 * 10 + 0
        assert_eq!(xp_earned(pattern, 90, 15, false), 125);
    }

    #[test]
    fn test_xp_earned_low_quality_and_quick() {
        let pattern = get_default_catalog().resolve("quick_4_4");
        // No quality bonus below 80, no duration bonus under 5 minutes
        assert_eq!(xp_earned(pattern, 60, 1, true), 25 + 25);
    }

    #[test]
    fn test_level_up_from_three_to_four() {
        let mut progress = level_three();
        assert!(apply_completion(&mut progress, 15, 1300));
        assert_eq!(progress.level, 4);
        assert_eq!(progress.xp_to_next_level, 7500);
        assert_eq!(progress.total_sessions, 1);
        assert_eq!(progress.total_minutes, 15);
    }

    #[test]
    fn test_single_level_up_even_when_overshooting() {
        let mut progress = level_three();
        // 2250 + 20000 would cover thresholds 3500, 7500 and 15000
        assert!(apply_completion(&mut progress, 15, 20_000));
        assert_eq!(progress.level, 4);
        assert_eq!(progress.xp_to_next_level, 7500);
    }

    #[test]
    fn test_no_level_up_below_threshold() {
        let mut progress = level_three();
        assert!(!apply_completion(&mut progress, 15, 125));
        assert_eq!(progress.level, 3);
        assert_eq!(progress.xp, 2375);
    }

    #[test]
    fn test_threshold_extrapolates_past_table() {
        assert_eq!(level_threshold(6), 30000);
        assert_eq!(level_threshold(7), 45000);
        assert_eq!(level_threshold(8), 60000);

        let mut progress = UserProgress {
            level: 6,
            xp: 29_900,
            xp_to_next_level: 30000,
            ..UserProgress::default()
        };
        assert!(apply_completion(&mut progress, 10, 200));
        assert_eq!(progress.level, 7);
        assert_eq!(progress.xp_to_next_level, 45000);
    }

    #[test]
    fn test_level_names() {
        assert_eq!(level_name(1), "Novice");
        assert_eq!(level_name(3), "Balanced Seeker");
        assert_eq!(level_name(7), "ANB Enlightened");
        assert_eq!(level_name(8), "Master");
    }

    #[test]
    fn test_streak_yesterday_increments() {
        let mut progress = UserProgress {
            current_streak: 4,
            last_session_date: Some(date(2025, 3, 1)),
            ..UserProgress::default()
        };
        update_streak(&mut progress, date(2025, 3, 2));
        assert_eq!(progress.current_streak, 5);
        assert_eq!(progress.last_session_date, Some(date(2025, 3, 2)));
    }

    #[test]
    fn test_streak_same_day_unchanged() {
        let mut progress = UserProgress {
            current_streak: 4,
            last_session_date: Some(date(2025, 3, 2)),
            ..UserProgress::default()
        };
        update_streak(&mut progress, date(2025, 3, 2));
        assert_eq!(progress.current_streak, 4);
    }

    #[test]
    fn test_streak_gap_resets() {
        let mut progress = UserProgress {
            current_streak: 4,
            last_session_date: Some(date(2025, 2, 27)),
            ..UserProgress::default()
        };
        update_streak(&mut progress, date(2025, 3, 2));
        assert_eq!(progress.current_streak, 1);

        let mut fresh = UserProgress::default();
        update_streak(&mut fresh, date(2025, 3, 2));
        assert_eq!(fresh.current_streak, 1);
        assert_eq!(fresh.last_session_date, Some(date(2025, 3, 2)));
    }

    #[test]
    fn test_wellness_formula() {
        let mut progress = UserProgress {
            current_streak: 5,
            total_sessions: 12,
            ..UserProgress::default()
        };
        // 0.4 * 90 + 0.3 * 10 + 0.3 * 12 = 36 + 3 + 3.6 = 42.6
        update_wellness(&mut progress, 90);
        assert_eq!(progress.wellness_score, 43);

        progress.current_streak = 50;
        progress.total_sessions = 500;
        // 40 + 6 + 9
        update_wellness(&mut progress, 100);
        assert_eq!(progress.wellness_score, 55);
    }

    #[test]
    fn test_average_quality_running_mean() {
        let mut progress = UserProgress {
            total_sessions: 1,
            ..UserProgress::default()
        };
        update_average_quality(&mut progress, 90);
        assert_eq!(progress.avg_quality, 90.0);

        progress.total_sessions = 2;
        update_average_quality(&mut progress, 85);
        assert_eq!(progress.avg_quality, 87.5);
    }

    #[test]
    fn test_first_session_achievement() {
        let mut progress = UserProgress {
            total_sessions: 1,
            ..UserProgress::default()
        };
        let mut achievements = default_achievements();

        let unlocked = evaluate_achievements(&mut progress, &mut achievements, 80);
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "first_session");
        assert_eq!(progress.xp, 100);
        let first = achievements.iter().find(|a| a.id == "first_session").unwrap();
        assert!(first.earned);
    }

    #[test]
    fn test_achievements_idempotent() {
        let mut progress = UserProgress {
            total_sessions: 1,
            current_streak: 7,
            ..UserProgress::default()
        };
        let mut achievements = default_achievements();

        let first = evaluate_achievements(&mut progress, &mut achievements, 96);
        assert_eq!(first.len(), 3);
        let xp_after_first = progress.xp;
        assert_eq!(xp_after_first, 100 + 500 + 750);

        let second = evaluate_achievements(&mut progress, &mut achievements, 96);
        assert!(second.is_empty());
        assert_eq!(progress.xp, xp_after_first);
        assert_eq!(achievements.iter().filter(|a| a.earned).count(), 3);
    }

    #[test]
    fn test_achievement_xp_rechecks_level() {
        let pattern = get_default_catalog().resolve("standard_5_5");
        let mut progress = UserProgress {
            level: 1,
            xp: 400,
            xp_to_next_level: 500,
            current_streak: 6,
            last_session_date: Some(date(2025, 3, 1)),
            total_sessions: 10,
            ..UserProgress::default()
        };
        let mut achievements = default_achievements();

        let outcome = complete_session(
            &mut progress,
            &mut achievements,
            &CompletedSession {
                pattern,
                session_quality: 90,
                duration_minutes: 15,
                session_minutes: 15,
                is_quick_mode: false,
                eye_closure: 95.0,
                today: date(2025, 3, 2),
            },
        );

        // 400 + 125 crosses 500 -> level 2 (next 1500)
        // streak hits 7, +500 XP -> 1025, still below 1500
        assert_eq!(outcome.result.xp_earned, 125);
        assert_eq!(outcome.unlocked.len(), 1);
        assert_eq!(outcome.levels_gained, 1);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.xp, 1025);
        assert_eq!(progress.eyes_closed_sessions, 1);

        // A second session the next day; rhythm badge (+750) pushes past 1500
        let outcome = complete_session(
            &mut progress,
            &mut achievements,
            &CompletedSession {
                pattern,
                session_quality: 96,
                duration_minutes: 15,
                session_minutes: 15,
                is_quick_mode: false,
                eye_closure: 95.0,
                today: date(2025, 3, 3),
            },
        );

        // 1025 + 75 + 32 + 30 = 1162 (< 1500), then +750 = 1912 -> level 3
        assert_eq!(outcome.result.xp_earned, 137);
        assert_eq!(outcome.levels_gained, 1);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.xp_to_next_level, 3500);
        assert_eq!(progress.current_streak, 8);
    }

    #[test]
    fn test_session_and_achievement_xp_gain_two_levels() {
        let pattern = get_default_catalog().resolve("standard_5_5");
        let mut progress = UserProgress {
            level: 1,
            xp: 450,
            xp_to_next_level: 500,
            current_streak: 6,
            last_session_date: Some(date(2025, 3, 1)),
            total_sessions: 10,
            ..UserProgress::default()
        };
        let mut achievements = default_achievements();

        let outcome = complete_session(
            &mut progress,
            &mut achievements,
            &CompletedSession {
                pattern,
                session_quality: 95,
                duration_minutes: 15,
                session_minutes: 15,
                is_quick_mode: false,
                eye_closure: 80.0,
                today: date(2025, 3, 2),
            },
        );

        // 450 + 135 crosses 500 -> level 2 (next 1500)
        // week streak (+500) and rhythm (+750) -> 1835 crosses 1500 -> level 3
        assert_eq!(outcome.result.xp_earned, 135);
        assert_eq!(outcome.unlocked.len(), 2);
        assert_eq!(outcome.levels_gained, 2);
        assert_eq!(progress.xp, 1835);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.xp_to_next_level, 3500);
    }
}
