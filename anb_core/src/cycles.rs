//! Cycle count calculation.

use crate::{Pattern, SessionConfig};

/// Fixed cycle count for quick sessions
pub const QUICK_SESSION_CYCLES: u32 = 4;

/// Number of full cycles that fit into the requested duration
///
/// One cycle runs the pattern once through each nostril. Always at least 1,
/// saturating at `u32::MAX` for absurd durations.
pub fn calculate_cycles(pattern: &Pattern, duration_minutes: u32) -> u32 {
    let cycle_seconds = u64::from(pattern.cycle_seconds().max(1));
    let cycles = u64::from(duration_minutes) * 60 / cycle_seconds;
    u32::try_from(cycles).unwrap_or(u32::MAX).max(1)
}

/// Total cycles for a session, honouring the quick-mode override
pub fn total_cycles(config: &SessionConfig) -> u32 {
    if config.is_quick_mode {
        QUICK_SESSION_CYCLES
    } else {
        calculate_cycles(&config.pattern, config.duration_minutes)
    }
}
