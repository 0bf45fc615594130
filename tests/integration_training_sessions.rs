use chordwise::drill::{DrillSession, Progress};
use chordwise::record;
use chordwise::store::{self, SessionDb, SessionStore};
use chordwise::theory::{Accidental, Chord, Letter, Note, Quality};
use chordwise::{stats, SessionResult, Settings};
use chrono::{Duration, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

/// Plays one untimed drill, answering with an enharmonic respelling of the
/// expected chord whenever one exists and getting the quality of position 7
/// wrong.
fn play(settings: Settings, seed: u64) -> SessionResult {
    let mut session = DrillSession::with_rng(settings, StdRng::seed_from_u64(seed));
    session.start().unwrap();
    loop {
        let key = *session.current_key().unwrap();
        let position = session.current_position().unwrap();
        let expected = key.chord_at(position).unwrap();
        let answer = if position == 7 {
            let wrong = Quality::ALL.into_iter().find(|q| *q != expected.quality).unwrap();
            Chord::new(expected.root, wrong)
        } else {
            respell(expected)
        };
        session.tick(0.25);
        let outcome = session.submit_answer(&answer).unwrap();
        assert_eq!(outcome.correct, position != 7);
        if let Progress::GameComplete(result) = outcome.progress {
            return result;
        }
    }
}

fn respell(chord: Chord) -> Chord {
    Letter::ALL
        .iter()
        .flat_map(|&l| Accidental::ALL.iter().map(move |&a| Note::new(l, a)))
        .find(|n| *n != chord.root && n.is_enharmonic(&chord.root))
        .map(|root| Chord::new(root, chord.quality))
        .unwrap_or(chord)
}

fn settings() -> Settings {
    Settings {
        major_keys: vec!["Eb".parse().unwrap()],
        minor_keys: vec!["F#".parse().unwrap()],
        questions_per_key: 10,
        delay_seconds: 0.0,
        limit_choices_to_key: false,
    }
}

#[test]
fn drill_results_survive_the_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    let result = play(settings(), 11);
    assert_eq!(result.total().attempts(), 20);
    let sevenths = result.response_times.iter().filter(|r| r.position == 7).count() as u32;
    assert_eq!(result.total_wrong(), sevenths);

    {
        let mut db = SessionDb::open(&path).unwrap();
        db.append_session(&result).unwrap();
    }
    let db = SessionDb::open(&path).unwrap();
    let loaded = db.load_all_sessions().unwrap();
    assert_eq!(loaded, vec![result.clone()]);

    let cumulative = stats::cumulative_stats(&loaded);
    assert_eq!(cumulative.total_sessions, 1);
    assert_eq!(cumulative.total_correct, u64::from(result.total_correct()));
    let keys: Vec<String> = cumulative.most_practiced.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, ["Eb", "F#m"]);

    let breakdown = stats::key_breakdown(&loaded, &"Eb".parse().unwrap());
    assert_eq!(breakdown.get(7).unwrap().correct, 0);
}

#[test]
fn export_then_import_into_a_fresh_store() {
    let mut first = play(settings(), 5);
    first.timestamp = Utc::now().trunc_subsecs(0) - Duration::days(2);
    let second = play(settings(), 6);

    let mut source = SessionDb::in_memory().unwrap();
    source.append_session(&first).unwrap();
    source.append_session(&second).unwrap();
    let csv = store::export_sessions(&source).unwrap();
    assert!(csv.starts_with("Timestamp,Key,Position,Correct,Wrong,TimeSeconds\n"));

    let mut target = SessionDb::in_memory().unwrap();
    let summary = store::import_sessions(&mut target, &csv).unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.duplicates, 0);

    let imported = target.load_all_sessions().unwrap();
    assert_eq!(imported.len(), 2);
    assert_eq!(imported[0].timestamp, first.timestamp);
    assert_eq!(imported, vec![record::normalize(&first), record::normalize(&second)]);

    let again = store::import_sessions(&mut target, &csv).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.duplicates, 2);
    assert_eq!(target.load_all_sessions().unwrap().len(), 2);
}

#[test]
fn played_drills_decode_to_their_normal_form() {
    let result = play(settings(), 23);
    let csv = record::encode(std::slice::from_ref(&result)).unwrap();
    let decoded = record::decode(&csv).unwrap();

    let normal = record::normalize(&result);
    assert_eq!(decoded, vec![normal.clone()]);
    assert_eq!(normal.key_scores, result.key_scores);
    assert_eq!(normal.response_times.len(), result.response_times.len());
    assert_eq!(record::encode(&decoded).unwrap(), csv);
}
