use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use chordwise::drill::{DrillSession, DrillState, Progress};
use chordwise::runtime::{DrillEvent, DrillEventSource, FixedTicker, Runner};
use chordwise::Settings;
use rand::rngs::StdRng;
use rand::SeedableRng;

struct ChannelSource {
    rx: Receiver<DrillEvent>,
}

impl DrillEventSource for ChannelSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<DrillEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

// Headless flow: the runner delivers typed lines, the session scores them.
#[test]
fn headless_drill_flow_completes() {
    let settings = Settings {
        major_keys: vec!["D".parse().unwrap()],
        minor_keys: vec!["B".parse().unwrap()],
        questions_per_key: 4,
        delay_seconds: 0.0,
        limit_choices_to_key: false,
    };
    let mut session = DrillSession::with_rng(settings, StdRng::seed_from_u64(42));
    session.start().unwrap();

    let (tx, rx) = mpsc::channel();
    let mut runner = Runner::new(ChannelSource { rx }, FixedTicker::new(Duration::from_millis(5)));

    let mut finished = None;
    for _ in 0..100 {
        let key = *session.current_key().unwrap();
        let position = session.current_position().unwrap();
        let answer = key.chord_at(position).unwrap().to_string();
        tx.send(DrillEvent::Line(answer)).unwrap();

        let (event, elapsed) = runner.step();
        session.tick(elapsed);
        let DrillEvent::Line(line) = event else {
            panic!("expected the queued line, got {event:?}");
        };
        let outcome = session.submit_answer(&line.parse().unwrap()).unwrap();
        assert!(outcome.correct);
        if let Progress::GameComplete(result) = outcome.progress {
            finished = Some(result);
            break;
        }
    }

    let result = finished.expect("drill should finish");
    assert_eq!(session.state(), DrillState::Completed);
    assert_eq!(result.total_correct(), 8);
    assert_eq!(result.total_wrong(), 0);
    let keys: Vec<String> = result.keys().map(ToString::to_string).collect();
    assert_eq!(keys, ["D", "Bm"]);
    assert!(result.response_times.iter().all(|r| r.seconds >= 0.0));
}

#[test]
fn idle_runner_ticks_time_out_a_timed_question() {
    let settings = Settings {
        delay_seconds: 0.5,
        ..Settings::default()
    };
    let mut session = DrillSession::with_rng(settings, StdRng::seed_from_u64(1));
    session.start().unwrap();

    let (_tx, rx) = mpsc::channel();
    let mut runner = Runner::new(ChannelSource { rx }, FixedTicker::new(Duration::from_millis(20)));

    let mut timed_out = false;
    for _ in 0..200 {
        let (event, elapsed) = runner.step();
        assert_eq!(event, DrillEvent::Tick);
        if session.tick(elapsed) == chordwise::TickOutcome::TimedOut {
            timed_out = true;
            break;
        }
    }
    assert!(timed_out);
    assert_eq!(session.questions_asked_in_key(), 0);
    assert_eq!(session.state(), DrillState::InProgress);
}
