use anb_core::config::MAX_SESSION_MINUTES;
use anb_core::history::MAX_HISTORY_DAYS;
use anb_core::progression::level_name;
use anb_core::*;
use chrono::{DateTime, Duration, Local, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};

/// Interval of the in-session metrics refresh
const REFRESH_INTERVAL_MS: i64 = 500;

/// Interval of the session clock
const TICK_INTERVAL_MS: i64 = 1000;

const JOURNAL_FILE: &str = "sessions.jsonl";

#[derive(Parser)]
#[command(name = "anb")]
#[command(about = "Alternate-nostril breathing coach", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided breathing session (default)
    Practice {
        /// Pattern id (see `anb patterns`)
        #[arg(long)]
        pattern: Option<String>,

        /// Session length in minutes
        #[arg(
            long,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SESSION_MINUTES))
        )]
        minutes: Option<u32>,

        /// One-minute quick session
        #[arg(long, conflicts_with_all = ["pattern", "minutes", "recommended"])]
        quick: bool,

        /// Recommended session (Deep Harmony 6:6 for 15 minutes)
        #[arg(long, conflicts_with_all = ["pattern", "minutes"])]
        recommended: bool,

        /// Run on a simulated clock without waiting (for testing)
        #[arg(long)]
        simulate: bool,
    },

    /// Show level, XP and streak
    Status,

    /// List achievements
    Achievements,

    /// List breathing patterns
    Patterns,

    /// Show recent sessions
    History {
        /// Number of days to include
        #[arg(
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_HISTORY_DAYS))
        )]
        days: u32,
    },

    /// Export the session journal to CSV
    Export {
        /// Output file (defaults to sessions.csv in the data directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show or reset settings
    Settings {
        /// Restore default settings
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        anb_core::logging::init_with_level("debug");
    } else {
        anb_core::logging::init();
    }

    // Determine data directory
    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    let data_dir = config.data.data_dir.clone();
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Some(Commands::Practice {
            pattern,
            minutes,
            quick,
            recommended,
            simulate,
        }) => cmd_practice(config, pattern, minutes, quick, recommended, simulate),
        Some(Commands::Status) => cmd_status(config),
        Some(Commands::Achievements) => cmd_achievements(config),
        Some(Commands::Patterns) => cmd_patterns(),
        Some(Commands::History { days }) => cmd_history(&data_dir, days),
        Some(Commands::Export { output }) => cmd_export(&data_dir, output),
        Some(Commands::Settings { reset }) => cmd_settings(config, reset),
        None => {
            // Default to "practice" command
            cmd_practice(config, None, None, false, false, false)
        }
    }
}

fn open_coach(config: Config) -> Coach<FileStore> {
    let data_dir = config.data.data_dir.clone();
    Coach::new(config, FileStore::new(&data_dir))
        .with_journal(JsonlJournal::new(data_dir.join(JOURNAL_FILE)))
}

fn cmd_practice(
    config: Config,
    pattern: Option<String>,
    minutes: Option<u32>,
    quick: bool,
    recommended: bool,
    simulate: bool,
) -> Result<()> {
    let errors = get_default_catalog().validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    std::fs::create_dir_all(&config.data.data_dir)?;
    let mut coach = open_coach(config);

    if let Some(id) = pattern {
        coach.select_pattern(&id);
    }
    if let Some(minutes) = minutes {
        coach.set_duration(minutes);
    }

    let mut clock = SessionClock::new(simulate);
    let mut console = Console::new(!simulate);

    // Hold the start events back until the header is shown
    let mut pending: Vec<Event> = Vec::new();
    let started = if quick {
        coach.start_quick_session(clock.now(), &mut pending)
    } else if recommended {
        coach.start_recommended_session(clock.now(), &mut pending)
    } else {
        coach.start_session(clock.now(), &mut pending)
    };
    if !started {
        return Err(Error::Other("Session could not be started".into()));
    }

    if let Some(session) = coach.session() {
        display_session_header(session);
    }
    for event in pending {
        console.emit(event);
    }

    let input = if simulate {
        None
    } else {
        println!("  'p' + Enter to pause or resume, 'q' + Enter to stop");
        Some(spawn_input_reader())
    };

    run_session(&mut coach, &mut clock, input, &mut console);
    console.finish_line();
    Ok(())
}

/// Drive the coach until the session completes or is stopped
///
/// The binary has no sensor source, so there is no ambient metrics driver:
/// `Coach::feed_metrics` is left to hosts with a camera or microphone feed.
fn run_session(
    coach: &mut Coach<FileStore>,
    clock: &mut SessionClock,
    mut input: Option<Receiver<InputCommand>>,
    console: &mut Console,
) {
    let refresh_interval = Duration::milliseconds(REFRESH_INTERVAL_MS);
    let mut schedule = TickSchedule::new(clock.now(), Duration::milliseconds(TICK_INTERVAL_MS));

    while coach.is_active() {
        let command = match input.as_ref() {
            Some(rx) => match rx.recv_timeout(refresh_interval.to_std().unwrap_or_default()) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Input closed, continuing without commands");
                    input = None;
                    None
                }
            },
            None => {
                clock.wait(refresh_interval);
                None
            }
        };

        let now = clock.now();
        match command {
            Some(InputCommand::TogglePause) => {
                coach.pause_toggle(now, console);
            }
            Some(InputCommand::Stop) => {
                coach.stop_session(console);
                break;
            }
            None => {}
        }

        coach.refresh_metrics(now, console);

        if let Some(tick_at) = schedule.due(now) {
            coach.tick(tick_at, console);
        }
    }
}

/// Fixed 1 Hz grid anchored at session start
///
/// Ticks carry the grid timestamp rather than the wake-up time, so phase
/// timers started by a tick stay aligned with the following ticks.
struct TickSchedule {
    next: DateTime<Utc>,
    interval: Duration,
}

impl TickSchedule {
    fn new(start: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            next: start + interval,
            interval,
        }
    }

    /// The latest grid point reached by `now`, if one is due
    ///
    /// Missed grid points are skipped; only the most recent one is returned.
    fn due(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if now < self.next {
            return None;
        }
        let mut tick_at = self.next;
        while tick_at + self.interval <= now {
            tick_at = tick_at + self.interval;
        }
        self.next = tick_at + self.interval;
        Some(tick_at)
    }
}

/// Wall clock, or a virtual clock that advances without sleeping
enum SessionClock {
    Wall,
    Simulated(DateTime<Utc>),
}

impl SessionClock {
    fn new(simulate: bool) -> Self {
        if simulate {
            SessionClock::Simulated(Utc::now())
        } else {
            SessionClock::Wall
        }
    }

    fn now(&self) -> DateTime<Utc> {
        match self {
            SessionClock::Wall => Utc::now(),
            SessionClock::Simulated(now) => *now,
        }
    }

    fn wait(&mut self, step: Duration) {
        match self {
            SessionClock::Wall => std::thread::sleep(step.to_std().unwrap_or_default()),
            SessionClock::Simulated(now) => *now = *now + step,
        }
    }
}

enum InputCommand {
    TogglePause,
    Stop,
}

/// Read commands from stdin on a separate thread
fn spawn_input_reader() -> Receiver<InputCommand> {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim().to_lowercase().as_str() {
                "p" => InputCommand::TogglePause,
                "q" => InputCommand::Stop,
                _ => continue,
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });

    rx
}

/// Prints core events to the terminal
struct Console {
    show_countdown: bool,
    line_open: bool,
}

impl Console {
    fn new(show_countdown: bool) -> Self {
        Self {
            show_countdown,
            line_open: false,
        }
    }

    fn finish_line(&mut self) {
        if self.line_open {
            println!();
            self.line_open = false;
        }
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        self.finish_line();
        println!("{}", text);
    }
}

impl EventSink for Console {
    fn emit(&mut self, event: Event) {
        match event {
            Event::PhaseChanged { phase, nostril } => match phase {
                Phase::Preparing => self.line("Get ready..."),
                Phase::Inhale | Phase::Exhale => {
                    self.finish_line();
                    print!("→ {} ({} nostril)", phase.label(), nostril.label().to_lowercase());
                    self.line_open = true;
                }
                Phase::Hold => {
                    self.finish_line();
                    print!("→ Hold");
                    self.line_open = true;
                }
                Phase::Complete | Phase::Idle => self.finish_line(),
            },
            Event::CountdownTick { seconds_remaining } => {
                if self.show_countdown {
                    print!(" {}", seconds_remaining);
                    let _ = io::stdout().flush();
                    self.line_open = true;
                }
            }
            Event::CycleCompleted {
                cycle_index,
                total_cycles,
            } => self.line(format!("  Cycle {}/{} complete", cycle_index, total_cycles)),
            Event::SessionCompleted(result) => {
                self.line("\n✓ Session complete!");
                println!("  Quality: {}%", result.quality_score);
                println!("  Duration: {} min", result.duration_minutes);
                println!("  XP earned: +{}", result.xp_earned);
            }
            Event::ProgressChanged(progress) => self.line(format!(
                "  Level {} ({}), {} / {} XP, streak {} day(s)",
                progress.level,
                level_name(progress.level),
                progress.xp,
                progress.xp_to_next_level,
                progress.current_streak
            )),
            Event::AchievementUnlocked(achievement) => self.line(format!(
                "★ Achievement unlocked: {} (+{} XP)",
                achievement.name, achievement.xp_reward
            )),
            Event::MetricsUpdated(_) => {}
            Event::Notify { message, severity } => {
                self.finish_line();
                match severity {
                    Severity::Info => println!("ℹ {}", message),
                    Severity::Success => println!("✓ {}", message),
                    Severity::Warning => println!("! {}", message),
                    Severity::Error => eprintln!("✗ {}", message),
                }
            }
        }
    }
}

fn display_session_header(session: &SessionOrchestrator) {
    let config = session.config();
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  ALTERNATE-NOSTRIL BREATHING");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {} ({})", config.pattern.name, config.pattern.ratio_label());
    println!("  {}", config.pattern.description);
    println!(
        "  Duration: {} min, {} cycles",
        config.duration_minutes,
        session.state().total_cycles
    );
    println!();
}

fn cmd_status(config: Config) -> Result<()> {
    let coach = open_coach(config);
    let progress = coach.progress();

    println!("Level {}: {}", progress.level, level_name(progress.level));
    println!("  XP: {} / {}", progress.xp, progress.xp_to_next_level);
    println!("  Streak: {} day(s)", progress.current_streak);
    println!("  Sessions: {}", progress.total_sessions);
    println!("  Minutes: {}", progress.total_minutes);
    println!("  Average quality: {:.1}%", progress.avg_quality);
    println!("  Wellness: {}", progress.wellness_score);
    if let Some(date) = progress.last_session_date {
        println!("  Last session: {}", date);
    }
    Ok(())
}

fn cmd_achievements(config: Config) -> Result<()> {
    let coach = open_coach(config);
    let achievements = coach.achievements();
    let earned = achievements.iter().filter(|a| a.earned).count();

    println!("Achievements ({}/{})", earned, achievements.len());
    for achievement in achievements {
        println!(
            "  [{}] {} ({:?}, +{} XP)",
            if achievement.earned { "x" } else { " " },
            achievement.name,
            achievement.rarity,
            achievement.xp_reward
        );
        println!("      {}", achievement.description);
    }
    Ok(())
}

fn cmd_patterns() -> Result<()> {
    for pattern in get_default_catalog().sorted() {
        println!(
            "{:<14} {} ({}), difficulty {}, {} XP, {} min",
            pattern.id,
            pattern.name,
            pattern.ratio_label(),
            pattern.difficulty,
            pattern.xp_value,
            pattern.optimal_duration_minutes
        );
        println!("               {}", pattern.description);
    }
    Ok(())
}

fn cmd_history(data_dir: &Path, days: u32) -> Result<()> {
    let journal_path = data_dir.join(JOURNAL_FILE);
    let records = load_recent_records(&journal_path, i64::from(days), Utc::now())?;

    if records.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    let today = Local::now().date_naive();
    println!("Last {} days:", days);
    for day in daily_summary(&records, days, today) {
        match day.avg_quality {
            Some(quality) => println!(
                "  {}  {} session(s), {} min, quality {:.0}%",
                day.date, day.sessions, day.minutes, quality
            ),
            None => println!("  {}  -", day.date),
        }
    }

    println!();
    println!("Recent sessions:");
    for record in &records {
        println!(
            "  {}  {:<14} {} min, quality {}%, +{} XP{}",
            record.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            record.pattern_id,
            record.duration_minutes,
            record.quality,
            record.xp_earned,
            if record.quick { " (quick)" } else { "" }
        );
    }
    Ok(())
}

fn cmd_export(data_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let journal_path = data_dir.join(JOURNAL_FILE);
    let csv_path = output.unwrap_or_else(|| data_dir.join("sessions.csv"));

    let count = export_csv(&journal_path, &csv_path)?;

    println!("✓ Exported {} sessions to CSV", count);
    println!("  CSV: {}", csv_path.display());
    Ok(())
}

fn cmd_settings(config: Config, reset: bool) -> Result<()> {
    let mut coach = open_coach(config);

    if reset {
        let mut console = Console::new(false);
        coach.reset_settings(&mut console);
    }

    let settings = coach.settings();
    println!("Settings:");
    println!("  Posture sensitivity: {}", settings.posture_sensitivity);
    println!("  Eye sensitivity: {}", settings.eye_sensitivity);
    println!("  Master volume: {}", settings.master_volume);
    println!("  Voice guidance: {}", on_off(settings.voice_guidance));
    println!("  Breathing sounds: {}", on_off(settings.breathing_sounds));
    println!("  Smart recommendations: {}", on_off(settings.smart_recommendations));
    println!("  Adaptive difficulty: {}", on_off(settings.adaptive_difficulty));
    println!("  Daily challenges: {}", on_off(settings.daily_challenges));
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
