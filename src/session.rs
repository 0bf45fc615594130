use crate::theory::{Chord, Key, POSITIONS};
use crate::util::percentage;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;

/// Right/wrong tally for one (key, position) cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionScore {
    pub correct: u32,
    pub wrong: u32,
}

impl PositionScore {
    pub fn new(correct: u32, wrong: u32) -> Self {
        Self { correct, wrong }
    }

    pub fn attempts(&self) -> u32 {
        self.correct + self.wrong
    }

    /// Percentage in `0.0..=100.0`; 0 when nothing was attempted.
    pub fn accuracy(&self) -> f64 {
        percentage(u64::from(self.correct), u64::from(self.attempts()))
    }

    pub fn record(&mut self, correct: bool) {
        if correct {
            self.correct += 1;
        } else {
            self.wrong += 1;
        }
    }

    fn absorb(&mut self, other: &PositionScore) {
        self.correct += other.correct;
        self.wrong += other.wrong;
    }
}

/// Scores for positions 1..=7 of one key. Unattempted positions stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionScores([PositionScore; 7]);

impl PositionScores {
    pub fn get(&self, position: u8) -> Option<&PositionScore> {
        self.0.get(usize::from(position).checked_sub(1)?)
    }

    pub fn get_mut(&mut self, position: u8) -> Option<&mut PositionScore> {
        self.0.get_mut(usize::from(position).checked_sub(1)?)
    }

    /// `(position, score)` for all seven positions.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &PositionScore)> {
        POSITIONS.zip(self.0.iter())
    }

    pub fn total(&self) -> PositionScore {
        self.0.iter().fold(PositionScore::default(), |mut acc, s| {
            acc.absorb(s);
            acc
        })
    }

    pub fn merge(&mut self, other: &PositionScores) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            mine.absorb(theirs);
        }
    }
}

pub type KeyScores = BTreeMap<Key, PositionScores>;

/// One answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTime {
    pub key: Key,
    pub position: u8,
    /// The chord the question asked for.
    pub chord: Chord,
    pub is_correct: bool,
    pub seconds: f64,
}

/// A finished drill: per-key tallies plus every response time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub timestamp: DateTime<Utc>,
    pub key_scores: KeyScores,
    pub response_times: Vec<ResponseTime>,
}

impl SessionResult {
    /// Empty result stamped at `timestamp`, truncated to whole seconds.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            key_scores: KeyScores::new(),
            response_times: Vec::new(),
        }
    }

    pub fn record(&mut self, sample: ResponseTime) {
        if let Some(score) = self
            .key_scores
            .entry(sample.key)
            .or_default()
            .get_mut(sample.position)
        {
            score.record(sample.is_correct);
        }
        self.response_times.push(sample);
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.key_scores.keys()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.key_scores.contains_key(key)
    }

    pub fn total(&self) -> PositionScore {
        self.key_scores
            .values()
            .fold(PositionScore::default(), |mut acc, scores| {
                acc.absorb(&scores.total());
                acc
            })
    }

    pub fn total_correct(&self) -> u32 {
        self.total().correct
    }

    pub fn total_wrong(&self) -> u32 {
        self.total().wrong
    }

    pub fn accuracy(&self) -> f64 {
        self.total().accuracy()
    }
}
