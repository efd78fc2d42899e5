//! Session orchestrator: the phase state machine of a practice session.
//!
//! One orchestrator drives exactly one session:
//!
//! ```text
//! idle -> preparing -> inhale -> (hold) -> exhale -> inhale -> ... -> complete
//! ```
//!
//! The orchestrator owns no timers. A scheduler calls [`SessionOrchestrator::tick`]
//! (normally at 1 Hz) with the current time, and every deadline is evaluated
//! against that timestamp. Stopping the session therefore clears every pending
//! deadline synchronously, and ticks arriving after stop or completion are
//! ignored.

use crate::cycles::total_cycles;
use crate::events::{Event, EventSink, Severity};
use crate::{Nostril, Phase, SessionConfig};
use chrono::{DateTime, Duration, Utc};

/// Number of countdown steps before the first inhale
pub const PREPARATION_SECONDS: u32 = 3;

/// Phase length used for phases without a pattern duration
pub const FALLBACK_PHASE_SECONDS: u32 = 4;

/// Mutable state of a running session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub active_nostril: Nostril,
    pub cycle_index: u32,
    pub total_cycles: u32,
    pub breath_count: u32,
    pub paused: bool,
    pub session_started_at: Option<DateTime<Utc>>,
    pub phase_started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn idle(total_cycles: u32) -> Self {
        Self {
            phase: Phase::Idle,
            active_nostril: Nostril::Left,
            cycle_index: 0,
            total_cycles,
            breath_count: 0,
            paused: false,
            session_started_at: None,
            phase_started_at: None,
        }
    }
}

/// Drives a single practice session through its phases
#[derive(Clone, Debug)]
pub struct SessionOrchestrator {
    config: SessionConfig,
    inter_cycle_pause: Duration,
    state: SessionState,
    breathing_started_at: Option<DateTime<Utc>>,
    inter_cycle_until: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionOrchestrator {
    /// Create an idle orchestrator for the given session
    pub fn new(config: SessionConfig, inter_cycle_pause: Duration) -> Self {
        let cycles = total_cycles(&config);
        Self {
            config,
            inter_cycle_pause,
            state: SessionState::idle(cycles),
            breathing_started_at: None,
            inter_cycle_until: None,
            completed_at: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase == Phase::Complete
    }

    /// When the session reached `complete`, if it has
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether an inter-cycle pause is pending
    pub fn in_cycle_break(&self) -> bool {
        self.inter_cycle_until.is_some()
    }

    /// Session length requested by the configuration
    pub fn total_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.config.duration_minutes) * 60)
    }

    /// Seconds left on the session-wide countdown, once breathing has begun
    pub fn session_remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.breathing_started_at
            .map(|started| (self.total_duration() - (now - started)).num_seconds().max(0))
    }

    /// Duration of a phase under the session's pattern
    pub fn phase_duration_for(&self, phase: Phase) -> u32 {
        let pattern = &self.config.pattern;
        match phase {
            Phase::Inhale => pattern.inhale_seconds,
            Phase::Hold => pattern.hold_seconds,
            Phase::Exhale => pattern.exhale_seconds,
            _ => FALLBACK_PHASE_SECONDS,
        }
    }

    /// Seconds spent in the current phase, `None` outside a running phase
    pub fn phase_elapsed_seconds(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.state.paused || self.inter_cycle_until.is_some() {
            return None;
        }
        self.state
            .phase_started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0)
    }

    /// Begin the session: enter `preparing` and start the countdown
    ///
    /// Returns false (and does nothing) unless the orchestrator is idle and
    /// has never run.
    pub fn start(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> bool {
        if self.state.phase != Phase::Idle || self.state.session_started_at.is_some() {
            tracing::debug!("Ignoring start: session already used");
            return false;
        }

        self.state.phase = Phase::Preparing;
        self.state.session_started_at = Some(now);
        self.state.phase_started_at = Some(now);

        tracing::info!(
            "Starting session: pattern {} for {} min, {} cycles{}",
            self.config.pattern.id,
            self.config.duration_minutes,
            self.state.total_cycles,
            if self.config.is_quick_mode { " (quick)" } else { "" }
        );

        sink.emit(Event::PhaseChanged {
            phase: Phase::Preparing,
            nostril: self.state.active_nostril,
        });
        sink.emit(Event::CountdownTick {
            seconds_remaining: PREPARATION_SECONDS,
        });
        true
    }

    /// Advance the session clock to `now`
    pub fn tick(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        match self.state.phase {
            Phase::Idle | Phase::Complete => return,
            Phase::Preparing => {
                self.tick_preparation(now, sink);
                return;
            }
            Phase::Inhale | Phase::Hold | Phase::Exhale => {}
        }

        // Session-wide countdown keeps running while paused
        if let Some(started) = self.breathing_started_at {
            if now - started >= self.total_duration() {
                tracing::info!("Session duration elapsed");
                self.complete(now, sink);
                return;
            }
        }

        if self.state.paused {
            return;
        }

        if let Some(until) = self.inter_cycle_until {
            if now < until {
                return;
            }
            self.inter_cycle_until = None;
            self.enter_current_phase(now, sink);
            return;
        }

        let Some(phase_started) = self.state.phase_started_at else {
            return;
        };
        let duration_ms = i64::from(self.phase_duration_for(self.state.phase)) * 1000;
        let remaining_ms = duration_ms - (now - phase_started).num_milliseconds();

        if remaining_ms <= 0 {
            self.advance_phase(now, sink);
        } else {
            sink.emit(Event::CountdownTick {
                seconds_remaining: ((remaining_ms + 999) / 1000) as u32,
            });
        }
    }

    fn tick_preparation(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        let Some(started) = self.state.phase_started_at else {
            return;
        };
        let remaining = i64::from(PREPARATION_SECONDS) - (now - started).num_seconds();

        if remaining > 0 {
            sink.emit(Event::CountdownTick {
                seconds_remaining: remaining as u32,
            });
        } else {
            self.begin_breathing(now, sink);
        }
    }

    fn begin_breathing(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        self.state.phase = Phase::Inhale;
        self.state.active_nostril = Nostril::Left;
        self.state.breath_count = 0;
        self.state.cycle_index = 0;
        self.breathing_started_at = Some(now);

        tracing::debug!("Preparation finished, first inhale");
        self.enter_current_phase(now, sink);
    }

    /// Restart the current phase's timer and announce it
    fn enter_current_phase(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        self.state.phase_started_at = Some(now);
        sink.emit(Event::PhaseChanged {
            phase: self.state.phase,
            nostril: self.state.active_nostril,
        });
        sink.emit(Event::CountdownTick {
            seconds_remaining: self.phase_duration_for(self.state.phase),
        });
    }

    /// Move to the next phase once the current one has elapsed
    ///
    /// No-op while paused or during an inter-cycle pause.
    pub fn advance_phase(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        if self.state.paused || self.inter_cycle_until.is_some() {
            tracing::debug!("Ignoring advance: phase timer not running");
            return;
        }
        let has_hold = self.config.pattern.has_hold();
        let (next, flip) = match self.state.phase {
            Phase::Inhale if has_hold => (Phase::Hold, false),
            Phase::Inhale | Phase::Hold => (Phase::Exhale, true),
            Phase::Exhale => (Phase::Inhale, false),
            Phase::Idle | Phase::Preparing | Phase::Complete => return,
        };

        self.state.breath_count += 1;
        self.state.phase = next;
        if flip {
            self.state.active_nostril = self.state.active_nostril.flipped();
        }
        self.state.phase_started_at = Some(now);

        if self.state.breath_count % self.config.pattern.breaths_per_cycle() == 0 {
            self.state.cycle_index += 1;
            sink.emit(Event::CycleCompleted {
                cycle_index: self.state.cycle_index,
                total_cycles: self.state.total_cycles,
            });
            tracing::debug!(
                "Cycle {}/{} complete",
                self.state.cycle_index,
                self.state.total_cycles
            );

            if self.state.cycle_index >= self.state.total_cycles {
                self.complete(now, sink);
                return;
            }

            self.inter_cycle_until = Some(now + self.inter_cycle_pause);
            return;
        }

        self.enter_current_phase(now, sink);
    }

    /// Toggle pause, returning the new paused flag
    pub fn toggle_pause(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> bool {
        if self.state.paused {
            self.resume(now, sink);
        } else {
            self.pause(sink);
        }
        self.state.paused
    }

    /// Freeze the phase countdown. No-op outside inhale/hold/exhale.
    pub fn pause(&mut self, sink: &mut impl EventSink) {
        if !self.state.phase.is_breathing() || self.state.paused {
            return;
        }
        self.state.paused = true;
        tracing::info!("Session paused");
        sink.emit(Event::notify("Session paused", Severity::Info));
    }

    /// Resume after a pause
    ///
    /// The current phase restarts with its full duration; progress made in
    /// the phase before pausing is not kept.
    pub fn resume(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        if !self.state.phase.is_breathing() || !self.state.paused {
            return;
        }
        self.state.paused = false;
        self.inter_cycle_until = None;
        tracing::info!("Session resumed");
        sink.emit(Event::notify("Resuming session", Severity::Info));
        self.enter_current_phase(now, sink);
    }

    /// Abandon the session immediately, without completion rewards
    pub fn stop(&mut self, sink: &mut impl EventSink) {
        if self.state.phase == Phase::Idle {
            return;
        }

        self.state.phase = Phase::Idle;
        self.state.paused = false;
        self.state.phase_started_at = None;
        self.breathing_started_at = None;
        self.inter_cycle_until = None;

        tracing::info!("Session stopped");
        sink.emit(Event::PhaseChanged {
            phase: Phase::Idle,
            nostril: self.state.active_nostril,
        });
        sink.emit(Event::notify("Session stopped", Severity::Warning));
    }

    fn complete(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        self.state.phase = Phase::Complete;
        self.state.paused = false;
        self.inter_cycle_until = None;
        self.completed_at = Some(now);

        tracing::info!(
            "Session complete after {} breaths, {}/{} cycles",
            self.state.breath_count,
            self.state.cycle_index,
            self.state.total_cycles
        );
        sink.emit(Event::PhaseChanged {
            phase: Phase::Complete,
            nostril: self.state.active_nostril,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::get_default_catalog;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn orchestrator(pattern_id: &str, minutes: u32, quick: bool) -> SessionOrchestrator {
        let config = SessionConfig {
            pattern: get_default_catalog().resolve(pattern_id).clone(),
            duration_minutes: minutes,
            is_quick_mode: quick,
        };
        SessionOrchestrator::new(config, Duration::milliseconds(1500))
    }

    /// Start at t0 and tick through the preparation countdown
    fn started(pattern_id: &str, minutes: u32) -> (SessionOrchestrator, Vec<Event>) {
        let mut orch = orchestrator(pattern_id, minutes, false);
        let mut events = Vec::new();
        assert!(orch.start(t0(), &mut events));
        for s in 1..=3 {
            orch.tick(secs(s), &mut events);
        }
        (orch, events)
    }

    fn phase_changes(events: &[Event]) -> Vec<(Phase, Nostril)> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::PhaseChanged { phase, nostril } => Some((*phase, *nostril)),
                _ => None,
            })
            .collect()
    }

    /// Tick once per second from `from` (inclusive) to `to` (exclusive)
    fn run(orch: &mut SessionOrchestrator, events: &mut Vec<Event>, from: i64, to: i64) {
        for s in from..to {
            orch.tick(secs(s), events);
        }
    }

    #[test]
    fn test_preparation_countdown() {
        crate::logging::init_test();
        let mut orch = orchestrator("standard_5_5", 15, false);
        let mut events = Vec::new();

        orch.start(t0(), &mut events);
        assert_eq!(orch.phase(), Phase::Preparing);

        orch.tick(secs(1), &mut events);
        orch.tick(secs(2), &mut events);
        assert_eq!(orch.phase(), Phase::Preparing);

        orch.tick(secs(3), &mut events);
        assert_eq!(orch.phase(), Phase::Inhale);
        assert_eq!(orch.state().active_nostril, Nostril::Left);
        assert_eq!(orch.state().breath_count, 0);
        assert_eq!(orch.state().cycle_index, 0);

        let countdown: Vec<u32> = events
            .iter()
            .take_while(|e| !matches!(e, Event::PhaseChanged { phase: Phase::Inhale, .. }))
            .filter_map(|e| match e {
                Event::CountdownTick { seconds_remaining } => Some(*seconds_remaining),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![3, 2, 1]);
    }

    #[test]
    fn test_start_only_from_idle() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();
        assert!(!orch.start(secs(10), &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_two_phase_sequence_alternates_nostrils() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();

        // Inhale L (3..8), exhale R (8..13), inhale R (13..18), exhale L (18..23)
        run(&mut orch, &mut events, 4, 24);

        assert_eq!(
            phase_changes(&events),
            vec![
                (Phase::Exhale, Nostril::Right),
                (Phase::Inhale, Nostril::Right),
                (Phase::Exhale, Nostril::Left),
            ]
        );
        assert_eq!(orch.state().breath_count, 4);
        assert_eq!(orch.state().cycle_index, 1);
        assert!(orch.in_cycle_break());
    }

    #[test]
    fn test_one_cycle_has_one_inhale_per_nostril() {
        let (mut orch, mut events) = started("standard_5_5", 15);
        run(&mut orch, &mut events, 4, 24);

        let inhales: Vec<Nostril> = phase_changes(&events)
            .into_iter()
            .filter(|(p, _)| *p == Phase::Inhale)
            .map(|(_, n)| n)
            .collect();
        assert_eq!(inhales, vec![Nostril::Left, Nostril::Right]);
    }

    #[test]
    fn test_hold_pattern_uses_six_breaths_per_cycle() {
        let (mut orch, mut events) = started("master_4_7_8", 25);
        // 2 * (4 + 7 + 8) = 38 seconds per cycle, starting at t=3
        run(&mut orch, &mut events, 4, 42);

        assert_eq!(orch.state().breath_count, 6);
        assert_eq!(orch.state().cycle_index, 1);

        let phases: Vec<_> = phase_changes(&events)
            .into_iter()
            .skip(1) // preparing
            .collect();
        assert_eq!(
            phases,
            vec![
                (Phase::Inhale, Nostril::Left),
                (Phase::Hold, Nostril::Left),
                (Phase::Exhale, Nostril::Right),
                (Phase::Inhale, Nostril::Right),
                (Phase::Hold, Nostril::Right),
                (Phase::Exhale, Nostril::Left),
            ]
        );
    }

    #[test]
    fn test_inter_cycle_pause_then_inhale() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();
        run(&mut orch, &mut events, 4, 24);
        assert!(orch.in_cycle_break());

        // Cycle finished at t=23, pause lasts 1.5s
        events.clear();
        orch.tick(secs(24), &mut events);
        assert!(orch.in_cycle_break());
        assert!(events.is_empty());

        orch.tick(secs(25), &mut events);
        assert!(!orch.in_cycle_break());
        assert_eq!(
            phase_changes(&events),
            vec![(Phase::Inhale, Nostril::Left)]
        );
        assert_eq!(orch.state().phase_started_at, Some(secs(25)));
    }

    #[test]
    fn test_completes_when_cycles_exhausted() {
        let mut orch = orchestrator("standard_5_5", 15, true);
        let mut events = Vec::new();
        orch.start(t0(), &mut events);
        assert_eq!(orch.state().total_cycles, 4);

        // Quick session: 4 cycles of 20s plus inter-cycle pauses fits in 15 min
        run(&mut orch, &mut events, 1, 200);

        assert!(orch.is_complete());
        assert_eq!(orch.state().cycle_index, 4);
        assert_eq!(orch.state().breath_count, 16);

        let cycles: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Event::CycleCompleted { .. }))
            .collect();
        assert_eq!(cycles.len(), 4);
    }

    #[test]
    fn test_session_countdown_forces_completion() {
        // 1 minute of 5:5 would allow 3 cycles, but the clock runs out first
        // because of the inter-cycle pauses
        let (mut orch, mut events) = started("standard_5_5", 1);
        run(&mut orch, &mut events, 4, 64);

        assert!(orch.is_complete());
        assert_eq!(orch.completed_at(), Some(secs(63)));
        assert!(orch.state().cycle_index < orch.state().total_cycles);
    }

    #[test]
    fn test_no_events_after_complete() {
        let (mut orch, mut events) = started("standard_5_5", 1);
        run(&mut orch, &mut events, 4, 64);
        assert!(orch.is_complete());

        let mut later = Vec::new();
        run(&mut orch, &mut later, 64, 100);
        orch.advance_phase(secs(100), &mut later);
        assert!(later.is_empty());
        assert!(orch.is_complete());
    }

    #[test]
    fn test_pause_freezes_phase_and_resume_restarts_it() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();

        orch.tick(secs(5), &mut events);
        assert!(orch.toggle_pause(secs(5), &mut events));

        // Well past the 5s inhale, nothing advances while paused
        run(&mut orch, &mut events, 6, 20);
        assert_eq!(orch.phase(), Phase::Inhale);
        assert_eq!(orch.state().breath_count, 0);

        assert!(!orch.toggle_pause(secs(20), &mut events));
        assert_eq!(orch.state().phase_started_at, Some(secs(20)));

        // Full 5s inhale again from the resume point
        orch.tick(secs(24), &mut events);
        assert_eq!(orch.phase(), Phase::Inhale);
        orch.tick(secs(25), &mut events);
        assert_eq!(orch.phase(), Phase::Exhale);
    }

    #[test]
    fn test_advance_ignored_while_paused_or_between_cycles() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();

        orch.pause(&mut events);
        events.clear();
        orch.advance_phase(secs(10), &mut events);
        assert_eq!(orch.phase(), Phase::Inhale);
        assert_eq!(orch.state().breath_count, 0);
        assert!(events.is_empty());
        orch.resume(secs(10), &mut events);

        // Inhale restarted at 10, so the cycle ends at t=30 and the break at 31.5
        run(&mut orch, &mut events, 11, 31);
        assert!(orch.in_cycle_break());
        assert_eq!(orch.state().breath_count, 4);
        events.clear();
        orch.advance_phase(secs(31), &mut events);
        assert_eq!(orch.state().breath_count, 4);
        assert!(events.is_empty());

        orch.tick(secs(32), &mut events);
        assert_eq!(
            phase_changes(&events),
            vec![(Phase::Inhale, Nostril::Left)]
        );
    }

    #[test]
    fn test_pause_is_noop_outside_breathing() {
        let mut orch = orchestrator("standard_5_5", 15, false);
        let mut events = Vec::new();

        assert!(!orch.toggle_pause(t0(), &mut events));
        orch.start(t0(), &mut events);
        events.clear();
        assert!(!orch.toggle_pause(t0(), &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_stop_clears_pending_deadlines() {
        let (mut orch, _) = started("standard_5_5", 15);
        let mut events = Vec::new();
        run(&mut orch, &mut events, 4, 24);
        assert!(orch.in_cycle_break());

        events.clear();
        orch.stop(&mut events);
        assert_eq!(orch.phase(), Phase::Idle);
        assert!(!orch.in_cycle_break());
        assert_eq!(orch.session_remaining_seconds(secs(30)), None);
        assert_eq!(phase_changes(&events), vec![(Phase::Idle, Nostril::Left)]);

        let mut later = Vec::new();
        run(&mut orch, &mut later, 24, 200);
        assert!(later.is_empty());
        assert!(!orch.is_complete());
    }

    #[test]
    fn test_stop_during_preparation() {
        let mut orch = orchestrator("standard_5_5", 15, false);
        let mut events = Vec::new();
        orch.start(t0(), &mut events);
        orch.stop(&mut events);

        let mut later = Vec::new();
        run(&mut orch, &mut later, 1, 10);
        assert!(later.is_empty());
        assert_eq!(orch.phase(), Phase::Idle);
    }

    #[test]
    fn test_breath_count_monotonic() {
        let (mut orch, _) = started("master_4_7_8", 25);
        let mut events = Vec::new();
        let mut last = 0;
        for s in 4..400 {
            orch.tick(secs(s), &mut events);
            assert!(orch.state().breath_count >= last);
            last = orch.state().breath_count;
        }
    }

    #[test]
    fn test_phase_duration_fallback() {
        let orch = orchestrator("master_4_7_8", 25, false);
        assert_eq!(orch.phase_duration_for(Phase::Hold), 7);
        assert_eq!(orch.phase_duration_for(Phase::Preparing), FALLBACK_PHASE_SECONDS);
    }
}
