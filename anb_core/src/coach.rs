//! The coach: host of a practice session and the user's progress.
//!
//! `Coach` ties the pieces together. It owns the loaded progress records and
//! the live metrics, creates one [`SessionOrchestrator`] per session, and
//! applies the progression rules when a session completes. Every command takes
//! the current time and an [`EventSink`], so the same coach runs under a wall
//! clock, a simulated clock or a test.

use crate::catalog::{
    get_default_catalog, PatternCatalog, QUICK_PATTERN_ID, RECOMMENDED_PATTERN_ID,
};
use crate::events::{Event, EventSink, Severity};
use crate::journal::SessionJournal;
use crate::orchestrator::SessionOrchestrator;
use crate::progression::{complete_session, level_name, CompletedSession};
use crate::quality::{self, INITIAL_SESSION_QUALITY};
use crate::store::{self, ProgressStore, ACHIEVEMENTS_KEY, PROGRESS_KEY, SETTINGS_KEY};
use crate::{
    Achievement, Config, LiveMetrics, MetricsReading, Pattern, Phase, SessionConfig,
    SessionRecord, Settings, UserProgress,
};
use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

/// Duration of the recommended session, in minutes
pub const RECOMMENDED_MINUTES: u32 = 15;

pub struct Coach<S: ProgressStore> {
    config: Config,
    catalog: &'static PatternCatalog,
    store: S,
    journal: Option<Box<dyn SessionJournal>>,
    progress: UserProgress,
    achievements: Vec<Achievement>,
    settings: Settings,
    metrics: LiveMetrics,
    pattern: Pattern,
    duration_minutes: u32,
    session: Option<SessionOrchestrator>,
}

impl<S: ProgressStore> Coach<S> {
    /// Create a coach and load the persisted records from `store`
    ///
    /// Missing or unreadable records fall back to defaults.
    pub fn new(config: Config, store: S) -> Self {
        let catalog = get_default_catalog();
        let pattern = catalog.resolve(&config.session.default_pattern).clone();
        let duration_minutes = config.session.default_minutes.max(1);

        let progress = store::load_progress(&store);
        let achievements = store::load_achievements(&store);
        let settings = store::load_settings(&store);

        tracing::debug!(
            "Loaded progress: level {}, {} XP, {} sessions",
            progress.level,
            progress.xp,
            progress.total_sessions
        );

        Self {
            config,
            catalog,
            store,
            journal: None,
            progress,
            achievements,
            settings,
            metrics: LiveMetrics::default(),
            pattern,
            duration_minutes,
            session: None,
        }
    }

    /// Record every completed session to `journal`
    pub fn with_journal(mut self, journal: impl SessionJournal + 'static) -> Self {
        self.journal = Some(Box::new(journal));
        self
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select the pattern for the next session and reset its duration
    ///
    /// Unknown ids select the default pattern.
    pub fn select_pattern(&mut self, id: &str) -> &Pattern {
        self.pattern = self.catalog.resolve(id).clone();
        self.duration_minutes = self.pattern.optimal_duration_minutes;
        tracing::debug!(
            "Selected pattern {} for {} min",
            self.pattern.id,
            self.duration_minutes
        );
        &self.pattern
    }

    /// Set the duration of the next session. Zero is ignored.
    pub fn set_duration(&mut self, minutes: u32) {
        if minutes == 0 {
            tracing::debug!("Ignoring zero session duration");
            return;
        }
        self.duration_minutes = minutes;
    }

    // ------------------------------------------------------------------
    // Session commands
    // ------------------------------------------------------------------

    /// Start a session with the selected pattern and duration
    pub fn start_session(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> bool {
        let config = SessionConfig {
            pattern: self.pattern.clone(),
            duration_minutes: self.duration_minutes,
            is_quick_mode: false,
        };
        self.start_session_with(config, now, sink)
    }

    /// Start a one-minute session on the quick pattern
    pub fn start_quick_session(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> bool {
        let pattern = self.catalog.resolve(QUICK_PATTERN_ID).clone();
        let config = SessionConfig {
            duration_minutes: pattern.optimal_duration_minutes,
            pattern,
            is_quick_mode: true,
        };
        self.start_session_with(config, now, sink)
    }

    /// Select the recommended pattern and start a session with it
    pub fn start_recommended_session(
        &mut self,
        now: DateTime<Utc>,
        sink: &mut impl EventSink,
    ) -> bool {
        self.select_pattern(RECOMMENDED_PATTERN_ID);
        self.set_duration(RECOMMENDED_MINUTES);
        self.start_session(now, sink)
    }

    /// Start a session from an explicit configuration
    ///
    /// Returns false when a session is already running or the duration is zero.
    pub fn start_session_with(
        &mut self,
        config: SessionConfig,
        now: DateTime<Utc>,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.session.is_some() {
            tracing::debug!("Ignoring start: a session is already running");
            return false;
        }
        if config.duration_minutes == 0 {
            tracing::warn!("Refusing to start a zero-minute session");
            return false;
        }

        let pause = self.config.timing.inter_cycle_pause(config.is_quick_mode);
        let message = if config.is_quick_mode {
            format!("Quick session: {} for 1 minute", config.pattern.name)
        } else {
            format!(
                "Starting {} ({}) for {} minutes",
                config.pattern.name,
                config.pattern.ratio_label(),
                config.duration_minutes
            )
        };

        let mut orchestrator = SessionOrchestrator::new(config, pause);
        if !orchestrator.start(now, sink) {
            return false;
        }

        self.metrics.session_quality = INITIAL_SESSION_QUALITY;
        self.session = Some(orchestrator);
        sink.emit(Event::notify(message, Severity::Info));
        true
    }

    /// Pause or resume the running session
    ///
    /// Returns the new paused flag, `None` when no session is running.
    pub fn pause_toggle(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) -> Option<bool> {
        self.session
            .as_mut()
            .map(|session| session.toggle_pause(now, sink))
    }

    /// Abandon the running session without rewards
    pub fn stop_session(&mut self, sink: &mut impl EventSink) {
        if let Some(mut session) = self.session.take() {
            session.stop(sink);
        }
    }

    /// Advance the running session to `now`, finishing it on completion
    pub fn tick(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        let complete = match self.session.as_mut() {
            Some(session) => {
                session.tick(now, sink);
                session.is_complete()
            }
            None => return,
        };

        if complete {
            self.finish_session(now, sink);
        }
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Fold an ambient sensor reading into the live metrics
    ///
    /// During a normal (non-quick) session, metrics below the guidance
    /// thresholds produce warnings.
    pub fn feed_metrics(&mut self, reading: &MetricsReading, sink: &mut impl EventSink) {
        quality::apply_reading(&mut self.metrics, reading);

        if let Some(session) = self.session.as_ref() {
            if session.phase().is_breathing() {
                self.metrics.session_quality =
                    quality::session_quality(&self.metrics, session.state().breath_count);

                if !session.config().is_quick_mode {
                    for hint in quality::guidance(&self.metrics, &self.config.guidance) {
                        sink.emit(Event::notify(hint, Severity::Warning));
                    }
                }
            }
        }

        sink.emit(Event::MetricsUpdated(self.metrics));
    }

    /// Re-score breathing rhythm from the current phase timing
    ///
    /// Only inhale and exhale are scored; other phases leave metrics as is.
    pub fn refresh_metrics(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let phase = session.phase();
        if !matches!(phase, Phase::Inhale | Phase::Exhale) {
            return;
        }
        let Some(elapsed) = session.phase_elapsed_seconds(now) else {
            return;
        };

        let target = f64::from(session.phase_duration_for(phase));
        self.metrics.breath_rhythm = quality::breathing_accuracy(elapsed, target).round();
        self.metrics.confidence = quality::confidence(&self.metrics);
        self.metrics.session_quality =
            quality::session_quality(&self.metrics, session.state().breath_count);

        sink.emit(Event::MetricsUpdated(self.metrics));
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Replace and persist the settings
    pub fn update_settings(&mut self, settings: Settings, sink: &mut impl EventSink) {
        self.settings = settings;
        match store::save(&mut self.store, SETTINGS_KEY, &self.settings) {
            Ok(()) => sink.emit(Event::notify("Settings saved", Severity::Success)),
            Err(e) => {
                tracing::error!("Failed to save settings: {}", e);
                sink.emit(Event::notify(
                    format!("Failed to save settings: {}", e),
                    Severity::Error,
                ));
            }
        }
    }

    /// Restore and persist the default settings
    pub fn reset_settings(&mut self, sink: &mut impl EventSink) {
        self.update_settings(Settings::default(), sink);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &'static PatternCatalog {
        self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }

    /// Pattern selected for the next session
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// The running session, if any
    pub fn session(&self) -> Option<&SessionOrchestrator> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    fn finish_session(&mut self, now: DateTime<Utc>, sink: &mut impl EventSink) {
        let Some(session) = self.session.take() else {
            return;
        };

        let completed_at = session.completed_at().unwrap_or(now);
        let started_at = session.state().session_started_at.unwrap_or(completed_at);
        let session_minutes = ((completed_at - started_at).num_seconds() / 60).max(0) as u32;
        let config = session.config();

        let completed = CompletedSession {
            pattern: &config.pattern,
            session_quality: self.metrics.session_quality,
            duration_minutes: config.duration_minutes,
            session_minutes,
            is_quick_mode: config.is_quick_mode,
            eye_closure: self.metrics.eye_closure,
            today: completed_at.with_timezone(&Local).date_naive(),
        };
        let outcome = complete_session(&mut self.progress, &mut self.achievements, &completed);

        tracing::info!(
            "Session finished: quality {}, {} min, +{} XP",
            outcome.result.quality_score,
            outcome.result.duration_minutes,
            outcome.result.xp_earned
        );

        self.persist_progress(sink);

        if let Some(journal) = self.journal.as_mut() {
            let record = SessionRecord {
                id: Uuid::new_v4(),
                pattern_id: config.pattern.id.clone(),
                quick: config.is_quick_mode,
                started_at,
                completed_at,
                duration_minutes: session_minutes,
                quality: outcome.result.quality_score,
                xp_earned: outcome.result.xp_earned,
            };
            if let Err(e) = journal.append(&record) {
                tracing::warn!("Failed to journal session: {}", e);
                sink.emit(Event::notify(
                    format!("Session history not updated: {}", e),
                    Severity::Warning,
                ));
            }
        }

        sink.emit(Event::SessionCompleted(outcome.result));
        sink.emit(Event::ProgressChanged(self.progress.clone()));
        for achievement in outcome.unlocked {
            sink.emit(Event::AchievementUnlocked(achievement));
        }
        if outcome.levels_gained > 0 {
            sink.emit(Event::notify(
                format!(
                    "Level up! You are now level {}: {}",
                    self.progress.level,
                    level_name(self.progress.level)
                ),
                Severity::Success,
            ));
        }
    }

    /// Save progress and achievements; failures are reported, state is kept
    fn persist_progress(&mut self, sink: &mut impl EventSink) {
        let saved = store::save(&mut self.store, PROGRESS_KEY, &self.progress)
            .and_then(|()| store::save(&mut self.store, ACHIEVEMENTS_KEY, &self.achievements));

        if let Err(e) = saved {
            tracing::error!("Failed to save progress: {}", e);
            sink.emit(Event::notify(
                format!("Failed to save progress: {}", e),
                Severity::Error,
            ));
        }
    }
}
