use crate::config::Settings;
use crate::error::ConfigError;
use crate::session::{ResponseTime, SessionResult};
use crate::theory::{Accidental, Chord, Key, Letter, Note, Quality, POSITIONS};
use chrono::{SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillState {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session isn't running, or the tick was not a usable duration.
    Ignored,
    Running,
    /// The question ran out of time and was replaced without being scored.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Continue,
    GameComplete(SessionResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub correct: bool,
    pub expected: Chord,
    pub progress: Progress,
}

/// Answer being assembled from separate note, accidental and quality pickers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingAnswer {
    pub note: Option<Letter>,
    pub accidental: Option<Accidental>,
    pub quality: Option<Quality>,
}

impl PendingAnswer {
    pub fn is_complete(&self) -> bool {
        self.chord().is_some()
    }

    pub fn chord(&self) -> Option<Chord> {
        Some(Chord::new(
            Note::new(self.note?, self.accidental?),
            self.quality?,
        ))
    }
}

/// What the presentation layer shows for the current question.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub key: Key,
    pub key_name: String,
    pub position: u8,
}

/// One drill run across every selected key.
///
/// Driven from a single owner: `tick` and the answer methods are the only
/// mutators, and calls made in the wrong state are ignored.
#[derive(Debug)]
pub struct DrillSession<R: Rng = StdRng> {
    settings: Settings,
    rng: R,
    state: DrillState,
    ordered_keys: Vec<Key>,
    scales: Vec<[Chord; 7]>,
    key_index: usize,
    position: u8,
    questions_asked_in_key: u32,
    remaining_secs: f64,
    elapsed_secs: f64,
    choices: Vec<Chord>,
    pending: PendingAnswer,
    result: Option<SessionResult>,
}

impl DrillSession<StdRng> {
    pub fn new(settings: Settings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }
}

impl<R: Rng> DrillSession<R> {
    pub fn with_rng(settings: Settings, rng: R) -> Self {
        let remaining_secs = settings.delay_seconds;
        Self {
            settings,
            rng,
            state: DrillState::NotStarted,
            ordered_keys: vec![],
            scales: vec![],
            key_index: 0,
            position: 1,
            questions_asked_in_key: 0,
            remaining_secs,
            elapsed_secs: 0.0,
            choices: vec![],
            pending: PendingAnswer::default(),
            result: None,
        }
    }

    /// Validates the settings and asks the first question.
    ///
    /// Calling `start` on a session that already left `NotStarted` does nothing.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        if self.state != DrillState::NotStarted {
            return Ok(());
        }
        self.settings.validate()?;

        self.ordered_keys = self.settings.ordered_keys();
        self.scales = self
            .ordered_keys
            .iter()
            .map(|key| {
                key.scale().map_err(|source| ConfigError::UnsupportedKey {
                    key: key.to_string(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        self.key_index = 0;
        self.questions_asked_in_key = 0;
        self.result = Some(SessionResult::new(Utc::now()));
        self.state = DrillState::InProgress;
        self.next_question();

        tracing::debug!(
            keys = self.ordered_keys.len(),
            questions_per_key = self.settings.questions_per_key,
            "drill started"
        );
        Ok(())
    }

    /// Advances the clock by `delta_secs`.
    ///
    /// In timed mode an expired question is replaced by a fresh one and is not
    /// scored. Untimed sessions only run the response stopwatch.
    pub fn tick(&mut self, delta_secs: f64) -> TickOutcome {
        if self.state != DrillState::InProgress || !delta_secs.is_finite() || delta_secs < 0.0 {
            return TickOutcome::Ignored;
        }
        self.elapsed_secs += delta_secs;
        if !self.settings.is_timed() {
            return TickOutcome::Running;
        }

        self.remaining_secs -= delta_secs;
        if self.remaining_secs <= 0.0 {
            tracing::debug!(
                key = %self.ordered_keys[self.key_index],
                position = self.position,
                "question timed out"
            );
            self.next_question();
            return TickOutcome::TimedOut;
        }
        TickOutcome::Running
    }

    /// Scores `candidate` against the current question and moves on.
    ///
    /// Returns `None` when the session isn't in progress.
    pub fn submit_answer(&mut self, candidate: &Chord) -> Option<SubmitOutcome> {
        if self.state != DrillState::InProgress {
            return None;
        }
        let key = self.ordered_keys[self.key_index];
        let expected = self.scales[self.key_index][usize::from(self.position - 1)];
        let correct = candidate.is_equivalent(&expected);

        let result = self.result.as_mut()?;
        result.record(ResponseTime {
            key,
            position: self.position,
            chord: expected,
            is_correct: correct,
            seconds: self.elapsed_secs,
        });
        self.questions_asked_in_key += 1;

        if self.questions_asked_in_key < self.settings.questions_per_key {
            self.next_question();
            return Some(SubmitOutcome {
                correct,
                expected,
                progress: Progress::Continue,
            });
        }

        if self.key_index + 1 < self.ordered_keys.len() {
            self.key_index += 1;
            self.questions_asked_in_key = 0;
            self.next_question();
            return Some(SubmitOutcome {
                correct,
                expected,
                progress: Progress::Continue,
            });
        }

        self.state = DrillState::Completed;
        self.choices.clear();
        self.pending = PendingAnswer::default();
        let mut finished = self.result.clone()?;
        finished.timestamp = Utc::now().trunc_subsecs(0);
        self.result = Some(finished.clone());

        tracing::info!(
            correct = finished.total_correct(),
            wrong = finished.total_wrong(),
            "drill complete"
        );
        Some(SubmitOutcome {
            correct,
            expected,
            progress: Progress::GameComplete(finished),
        })
    }

    pub fn select_note(&mut self, letter: Letter) {
        if self.state == DrillState::InProgress {
            self.pending.note = Some(letter);
        }
    }

    pub fn select_accidental(&mut self, accidental: Accidental) {
        if self.state == DrillState::InProgress {
            self.pending.accidental = Some(accidental);
        }
    }

    pub fn select_quality(&mut self, quality: Quality) {
        if self.state == DrillState::InProgress {
            self.pending.quality = Some(quality);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_complete()
    }

    /// Submits the composed answer; ignored until note, accidental and quality
    /// are all selected.
    pub fn submit_composed_answer(&mut self) -> Option<SubmitOutcome> {
        let chord = self.pending.chord()?;
        self.submit_answer(&chord)
    }

    fn next_question(&mut self) {
        self.position = self.rng.gen_range(POSITIONS);
        self.remaining_secs = self.settings.delay_seconds;
        self.elapsed_secs = 0.0;
        self.pending = PendingAnswer::default();
        self.choices.clear();
        if self.settings.limit_choices_to_key {
            if let Some(scale) = self.scales.get(self.key_index) {
                self.choices.extend_from_slice(scale);
                self.choices.shuffle(&mut self.rng);
            }
        }
    }

    pub fn state(&self) -> DrillState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_key(&self) -> Option<&Key> {
        match self.state {
            DrillState::InProgress => self.ordered_keys.get(self.key_index),
            _ => None,
        }
    }

    pub fn current_position(&self) -> Option<u8> {
        self.current_key().map(|_| self.position)
    }

    pub fn current_question(&self) -> Option<Question> {
        let key = *self.current_key()?;
        Some(Question {
            key,
            key_name: key.to_string(),
            position: self.position,
        })
    }

    /// Share of the time budget left, 1.0 for untimed sessions.
    pub fn remaining_fraction(&self) -> f64 {
        if !self.settings.is_timed() {
            return 1.0;
        }
        (self.remaining_secs / self.settings.delay_seconds).clamp(0.0, 1.0)
    }

    pub fn remaining_secs(&self) -> f64 {
        self.remaining_secs
    }

    /// Shuffled chords of the current key in limited-choice mode, empty otherwise.
    pub fn choices(&self) -> &[Chord] {
        &self.choices
    }

    pub fn pending(&self) -> &PendingAnswer {
        &self.pending
    }

    pub fn questions_asked_in_key(&self) -> u32 {
        self.questions_asked_in_key
    }

    /// `(current key index, number of keys)`, zero-based index.
    pub fn key_progress(&self) -> (usize, usize) {
        (self.key_index, self.ordered_keys.len())
    }

    /// The finished result once the session is complete.
    pub fn result(&self) -> Option<&SessionResult> {
        match self.state {
            DrillState::Completed => self.result.as_ref(),
            _ => None,
        }
    }
}
