use chordwise::{
    config::{ConfigStore, FileConfigStore, Settings},
    drill::{DrillSession, Progress, SubmitOutcome, TickOutcome},
    runtime::{DrillEvent, DrillEventSource, FixedTicker, LineEventSource, Runner, Ticker},
    session::SessionResult,
    stats,
    store::{self, SessionDb, SessionStore},
    theory::{roman_numeral, Chord, Key, Note, POSITIONS},
    StorageError, TheoryError,
};
use clap::{Args, Parser, Subcommand};
use rand::Rng;
use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TICK_RATE_MS: u64 = 100;

/// diatonic chord drills with enharmonic-aware scoring and progress tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Name the chord built on each position of a major or natural minor key. \
                  Drills are scored per key and position, and finished sessions are kept \
                  for progress statistics."
)]
pub struct Cli {
    /// settings file to use instead of the platform default
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// session database to use instead of the platform default
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print the seven chords of a key, e.g. `scale F#m`
    Scale { key: Key },

    /// run an interactive drill on stdin
    Drill(DrillArgs),

    /// show cumulative stats, a per-key breakdown, or one position's progress
    Stats {
        #[clap(short = 'k', long)]
        key: Option<Key>,

        #[clap(
            short = 'p',
            long,
            requires = "key",
            value_parser = clap::value_parser!(u8).range(1..=7)
        )]
        position: Option<u8>,
    },

    /// write session history as CSV to a file, or stdout when no path is given
    Export { path: Option<PathBuf> },

    /// merge sessions from a CSV export into the history
    Import { path: PathBuf },

    /// print the effective settings
    Config,
}

#[derive(Args, Debug, Clone, Default)]
struct DrillArgs {
    /// major keys to drill, replacing the stored selection
    #[clap(long, num_args = 1..)]
    major: Vec<Note>,

    /// roots of natural minor keys to drill, replacing the stored selection
    #[clap(long, num_args = 1..)]
    minor: Vec<Note>,

    /// questions asked per key
    #[clap(short = 'q', long)]
    questions: Option<u32>,

    /// seconds per question, 0 for untimed
    #[clap(short = 'd', long)]
    delay: Option<f64>,

    /// type any chord instead of picking from the key's seven
    #[clap(long)]
    full_choice: bool,

    /// store the effective settings as the new defaults
    #[clap(long)]
    save: bool,
}

impl DrillArgs {
    /// Flags given on the command line override `settings`.
    fn apply(&self, mut settings: Settings) -> Settings {
        if !self.major.is_empty() || !self.minor.is_empty() {
            settings.major_keys = self.major.clone();
            settings.minor_keys = self.minor.clone();
        }
        if let Some(questions) = self.questions {
            settings.questions_per_key = questions;
        }
        if let Some(delay) = self.delay {
            settings.delay_seconds = delay;
        }
        if self.full_choice {
            settings.limit_choices_to_key = false;
        }
        settings
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut out = io::stdout().lock();

    match &cli.command {
        Command::Scale { key } => print_scale(key, &mut out)?,
        Command::Drill(args) => {
            let settings = args.apply(config_store.load());
            settings.validate()?;
            if args.save {
                config_store.save(&settings)?;
            }
            let mut session = DrillSession::new(settings);
            let mut runner = Runner::new(
                LineEventSource::stdin(),
                FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
            );
            if let Some(result) = run_drill(&mut session, &mut runner, &mut out)? {
                finish_drill(&result, cli.db.as_deref(), &mut out)?;
            }
        }
        Command::Stats { key, position } => {
            let history = open_store(cli.db.as_deref())?;
            let sessions = history.load_all_sessions()?;
            match (key, position) {
                (Some(key), Some(position)) => {
                    print_progress(&sessions, key, *position, &mut out)?
                }
                (Some(key), None) => print_breakdown(&sessions, key, &mut out)?,
                _ => print_cumulative(&sessions, &mut out)?,
            }
        }
        Command::Export { path } => {
            let history = open_store(cli.db.as_deref())?;
            let csv = store::export_sessions(history.as_ref())?;
            match path {
                Some(path) => fs::write(path, csv)?,
                None => out.write_all(csv.as_bytes())?,
            }
        }
        Command::Import { path } => {
            let text = fs::read_to_string(path)?;
            let mut history = open_store(cli.db.as_deref())?;
            let summary = store::import_sessions(history.as_mut(), &text)?;
            writeln!(
                out,
                "imported {} sessions ({} already present, {} dropped by the {}-session limit)",
                summary.imported,
                summary.duplicates,
                summary.dropped,
                store::RETENTION_CAP
            )?;
        }
        Command::Config => {
            writeln!(out, "# {}", config_store.path().display())?;
            writeln!(out, "{}", serde_json::to_string_pretty(&config_store.load())?)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chordwise=warn")),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_store(path: Option<&Path>) -> Result<Box<dyn SessionStore>, StorageError> {
    let db = match path {
        Some(path) => SessionDb::open(path)?,
        None => SessionDb::open_default()?,
    };
    Ok(Box::new(db))
}

/// Reports `result`, then stores it. The report comes first so a storage
/// failure still shows the score before the error.
fn finish_drill<W: Write>(
    result: &SessionResult,
    db: Option<&Path>,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    print_result(result, out)?;
    out.flush()?;
    let mut history = open_store(db)?;
    history.append_session(result)?;
    Ok(())
}

/// Drives `session` from `runner` until it completes or input closes.
///
/// Returns the finished result, or `None` when the drill was abandoned.
fn run_drill<R, E, T, W>(
    session: &mut DrillSession<R>,
    runner: &mut Runner<E, T>,
    out: &mut W,
) -> Result<Option<SessionResult>, Box<dyn Error>>
where
    R: Rng,
    E: DrillEventSource,
    T: Ticker,
    W: Write,
{
    session.start()?;
    print_question(session, out)?;
    runner.reset_clock();

    loop {
        let (event, elapsed) = runner.step();
        if session.tick(elapsed) == TickOutcome::TimedOut {
            writeln!(out, "time's up")?;
            print_question(session, out)?;
            // the line, if any, was typed for the expired question
            continue;
        }

        let line = match event {
            DrillEvent::Tick => continue,
            DrillEvent::Eof => {
                writeln!(out, "input closed, drill abandoned")?;
                return Ok(None);
            }
            DrillEvent::Line(line) => line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "q" | "quit") {
            writeln!(out, "drill abandoned")?;
            return Ok(None);
        }

        let outcome = match answer(session, line) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => continue,
            Err(e) => {
                writeln!(out, "{e}, try again")?;
                continue;
            }
        };
        report(&outcome, out)?;
        match outcome.progress {
            Progress::Continue => {
                print_question(session, out)?;
                runner.reset_clock();
            }
            Progress::GameComplete(result) => return Ok(Some(result)),
        }
    }
}

/// Limited-choice drills take a choice number or a chord name; full-choice
/// drills compose the typed chord from its parts.
fn answer<R: Rng>(
    session: &mut DrillSession<R>,
    line: &str,
) -> Result<Option<SubmitOutcome>, TheoryError> {
    if !session.choices().is_empty() {
        let chord = match line.parse::<usize>() {
            Ok(n) => n
                .checked_sub(1)
                .and_then(|i| session.choices().get(i))
                .copied()
                .ok_or_else(|| TheoryError::InvalidChord(line.to_string()))?,
            Err(_) => line.parse::<Chord>()?,
        };
        return Ok(session.submit_answer(&chord));
    }

    let chord: Chord = line.parse()?;
    session.select_note(chord.root.letter);
    session.select_accidental(chord.root.accidental);
    session.select_quality(chord.quality);
    Ok(session.submit_composed_answer())
}

fn print_question<R: Rng, W: Write>(session: &DrillSession<R>, out: &mut W) -> io::Result<()> {
    let Some(question) = session.current_question() else {
        return Ok(());
    };
    let (key_index, key_count) = session.key_progress();
    write!(
        out,
        "[key {}/{} · {} {}/{}] position {}",
        key_index + 1,
        key_count,
        question.key_name,
        session.questions_asked_in_key() + 1,
        session.settings().questions_per_key,
        question.position
    )?;
    if session.settings().is_timed() {
        write!(out, " ({:.1}s)", session.remaining_secs())?;
    }
    writeln!(out)?;

    if !session.choices().is_empty() {
        let choices = session
            .choices()
            .iter()
            .enumerate()
            .map(|(i, chord)| format!("{}) {chord}", i + 1))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "  {choices}")?;
    }
    write!(out, "> ")?;
    out.flush()
}

fn report<W: Write>(outcome: &SubmitOutcome, out: &mut W) -> io::Result<()> {
    if outcome.correct {
        writeln!(out, "correct")
    } else {
        writeln!(out, "wrong, it was {}", outcome.expected)
    }
}

fn print_result<W: Write>(result: &SessionResult, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "drill complete: {} correct, {} wrong ({:.0}%)",
        result.total_correct(),
        result.total_wrong(),
        result.accuracy()
    )?;
    for (key, scores) in &result.key_scores {
        let total = scores.total();
        writeln!(
            out,
            "  {:<4} {:>3}/{:<3} {:>5.1}%",
            key.to_string(),
            total.correct,
            total.attempts(),
            total.accuracy()
        )?;
    }
    if let Some(summary) = stats::response_time_summary(&result.response_times) {
        writeln!(
            out,
            "  response {:.2}s avg, {:.2}s fastest, {:.2}s slowest",
            summary.mean_secs, summary.fastest_secs, summary.slowest_secs
        )?;
    }
    Ok(())
}

fn print_scale<W: Write>(key: &Key, out: &mut W) -> Result<(), Box<dyn Error>> {
    for (position, chord) in POSITIONS.zip(key.scale()?) {
        let numeral = roman_numeral(position, chord.quality).unwrap_or_default();
        writeln!(out, "{position}  {numeral:<5} {chord}")?;
    }
    Ok(())
}

fn print_cumulative<W: Write>(sessions: &[SessionResult], out: &mut W) -> io::Result<()> {
    let cumulative = stats::cumulative_stats(sessions);
    writeln!(out, "sessions: {}", cumulative.total_sessions)?;
    writeln!(
        out,
        "answers:  {} correct, {} wrong ({:.1}%)",
        cumulative.total_correct, cumulative.total_wrong, cumulative.overall_accuracy
    )?;
    if !cumulative.most_practiced.is_empty() {
        let keys = cumulative
            .most_practiced
            .iter()
            .map(|(key, n)| format!("{key} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "most practiced: {keys}")?;
    }
    let samples = sessions.iter().flat_map(|s| &s.response_times);
    if let Some(summary) = stats::response_time_summary(samples) {
        writeln!(
            out,
            "response: {:.2}s avg ± {:.2}s over {} answers",
            summary.mean_secs, summary.std_dev_secs, summary.count
        )?;
    }
    Ok(())
}

fn print_breakdown<W: Write>(
    sessions: &[SessionResult],
    key: &Key,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let breakdown = stats::key_breakdown(sessions, key);
    let samples: Vec<_> = sessions
        .iter()
        .flat_map(|s| s.response_times.iter().cloned())
        .collect();
    let averages = stats::average_response_by_position(&samples, key);

    writeln!(out, "{key}")?;
    for ((position, score), chord) in breakdown.iter().zip(key.scale()?) {
        let numeral = roman_numeral(position, chord.quality).unwrap_or_default();
        let avg = averages[usize::from(position - 1)]
            .map(|secs| format!("{secs:.2}s"))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{position}  {numeral:<5} {:<5} {:>3}/{:<3} {:>5.1}%  {avg}",
            chord.to_string(),
            score.correct,
            score.attempts(),
            score.accuracy()
        )?;
    }
    let total = breakdown.total();
    writeln!(out, "total {}/{} ({:.1}%)", total.correct, total.attempts(), total.accuracy())?;
    Ok(())
}

fn print_progress<W: Write>(
    sessions: &[SessionResult],
    key: &Key,
    position: u8,
    out: &mut W,
) -> io::Result<()> {
    let series = stats::progress_series(sessions, key, position);
    if series.is_empty() {
        writeln!(out, "no sessions practiced {key}")?;
        return Ok(());
    }
    for point in series {
        writeln!(
            out,
            "#{:<3} {}  {:>3}/{:<3} {:>5.1}%",
            point.session_index,
            chordwise::record::format_timestamp(&point.timestamp),
            point.correct,
            point.correct + point.wrong,
            point.accuracy
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordwise::drill::DrillState;
    use chordwise::theory::Letter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn runner_for(input: &str) -> Runner<LineEventSource, FixedTicker> {
        Runner::new(
            LineEventSource::new(Cursor::new(input.to_string())),
            FixedTicker::new(Duration::from_millis(10)),
        )
    }

    fn untimed(questions: u32, limited: bool) -> Settings {
        Settings {
            questions_per_key: questions,
            delay_seconds: 0.0,
            limit_choices_to_key: limited,
            ..Settings::default()
        }
    }

    #[test]
    fn test_cli_scale() {
        let cli = Cli::parse_from(["chordwise", "scale", "F#m"]);
        match cli.command {
            Command::Scale { key } => assert_eq!(key.to_string(), "F#m"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_key() {
        assert!(Cli::try_parse_from(["chordwise", "scale", "H"]).is_err());
    }

    #[test]
    fn test_cli_drill_flags() {
        let cli = Cli::parse_from([
            "chordwise",
            "drill",
            "--major",
            "C",
            "G",
            "--minor",
            "E",
            "-q",
            "5",
            "-d",
            "0",
            "--full-choice",
        ]);
        let Command::Drill(args) = cli.command else {
            panic!("expected drill");
        };
        let settings = args.apply(Settings::default());
        assert_eq!(settings.major_keys, vec![Note::natural(Letter::C), Note::natural(Letter::G)]);
        assert_eq!(settings.minor_keys, vec![Note::natural(Letter::E)]);
        assert_eq!(settings.questions_per_key, 5);
        assert!(!settings.is_timed());
        assert!(!settings.limit_choices_to_key);
    }

    #[test]
    fn test_drill_args_keep_stored_settings_when_absent() {
        let stored = Settings {
            minor_keys: vec![Note::natural(Letter::A)],
            questions_per_key: 20,
            ..Settings::default()
        };
        assert_eq!(DrillArgs::default().apply(stored.clone()), stored);
    }

    #[test]
    fn test_stats_position_requires_key() {
        assert!(Cli::try_parse_from(["chordwise", "stats", "-p", "3"]).is_err());
        assert!(Cli::try_parse_from(["chordwise", "stats", "-k", "C", "-p", "8"]).is_err());
        assert!(Cli::try_parse_from(["chordwise", "stats", "-k", "C", "-p", "3"]).is_ok());
    }

    #[test]
    fn test_global_paths() {
        let cli = Cli::parse_from(["chordwise", "stats", "--db", "/tmp/x.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_run_drill_by_choice_number() {
        let mut session = DrillSession::with_rng(untimed(3, true), StdRng::seed_from_u64(3));
        let mut runner = runner_for("1\n\n2\n3\n");
        let mut out = Vec::new();

        let result = run_drill(&mut session, &mut runner, &mut out).unwrap().unwrap();
        assert_eq!(result.total().attempts(), 3);
        assert_eq!(session.state(), DrillState::Completed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1) "));
    }

    #[test]
    fn test_run_drill_full_choice_composes_typed_chords() {
        let mut session = DrillSession::with_rng(untimed(2, false), StdRng::seed_from_u64(9));
        let mut runner = runner_for("C\nnot a chord\nDm\n");
        let mut out = Vec::new();

        let result = run_drill(&mut session, &mut runner, &mut out).unwrap().unwrap();
        assert_eq!(result.total().attempts(), 2);
        assert_eq!(result.response_times[0].key.to_string(), "C");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("invalid chord 'not a chord', try again"));
    }

    #[test]
    fn test_run_drill_abandoned_on_eof() {
        let mut session = DrillSession::with_rng(untimed(5, true), StdRng::seed_from_u64(1));
        let mut runner = runner_for("1\n");
        let mut out = Vec::new();

        assert!(run_drill(&mut session, &mut runner, &mut out).unwrap().is_none());
        assert!(String::from_utf8(out).unwrap().contains("abandoned"));
    }

    #[test]
    fn test_run_drill_quit() {
        let mut session = DrillSession::with_rng(untimed(5, true), StdRng::seed_from_u64(1));
        let mut runner = runner_for("quit\n1\n");
        let mut out = Vec::new();
        assert!(run_drill(&mut session, &mut runner, &mut out).unwrap().is_none());
        assert_eq!(session.state(), DrillState::InProgress);
    }

    #[test]
    fn test_run_drill_rejects_invalid_settings() {
        let settings = Settings {
            major_keys: vec![],
            ..untimed(1, true)
        };
        let mut session = DrillSession::with_rng(settings, StdRng::seed_from_u64(1));
        let mut runner = runner_for("");
        assert!(run_drill(&mut session, &mut runner, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_print_scale() {
        let mut out = Vec::new();
        print_scale(&"Em".parse().unwrap(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].contains("ii°") && lines[1].ends_with("F#°"));
    }

    #[test]
    fn test_print_cumulative_with_no_history() {
        let mut out = Vec::new();
        print_cumulative(&[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("sessions: 0"));
        assert!(!text.contains("most practiced"));
    }

    #[test]
    fn test_finish_drill_reports_before_a_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let db = blocker.join("sessions.db");

        let mut session = DrillSession::with_rng(untimed(1, true), StdRng::seed_from_u64(2));
        let mut runner = runner_for("1\n");
        let result = run_drill(&mut session, &mut runner, &mut Vec::new())
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        assert!(finish_drill(&result, Some(&db), &mut out).is_err());
        assert!(String::from_utf8(out).unwrap().starts_with("drill complete: "));
    }

    #[test]
    fn test_finish_drill_stores_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("sessions.db");
        let mut session = DrillSession::with_rng(untimed(1, true), StdRng::seed_from_u64(2));
        let mut runner = runner_for("1\n");
        let result = run_drill(&mut session, &mut runner, &mut Vec::new())
            .unwrap()
            .unwrap();

        finish_drill(&result, Some(&db), &mut Vec::new()).unwrap();
        let stored = SessionDb::open(&db).unwrap().load_all_sessions().unwrap();
        assert_eq!(stored, vec![result]);
    }
}
