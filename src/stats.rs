//! Folds over finished sessions: overall accuracy, cumulative totals, most
//! practiced keys, per-position progress and response-time summaries.

use crate::session::{KeyScores, PositionScore, PositionScores, ResponseTime, SessionResult};
use crate::theory::{Key, POSITIONS};
use crate::time_series::ProgressPoint;
use crate::util::{mean, percentage, std_dev};
use itertools::Itertools;

pub const MOST_PRACTICED_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeStats {
    pub total_sessions: usize,
    pub total_correct: u64,
    pub total_wrong: u64,
    pub overall_accuracy: f64,
    /// Keys with the number of sessions that practiced them, most first.
    pub most_practiced: Vec<(Key, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseTimeSummary {
    pub count: usize,
    pub mean_secs: f64,
    pub std_dev_secs: f64,
    pub fastest_secs: f64,
    pub slowest_secs: f64,
}

/// Correct share of every attempt in `scores`, as a percentage.
pub fn overall_accuracy(scores: &KeyScores) -> f64 {
    let (correct, attempts) = scores
        .values()
        .map(PositionScores::total)
        .fold((0u64, 0u64), |(c, a), s| {
            (c + u64::from(s.correct), a + u64::from(s.attempts()))
        });
    percentage(correct, attempts)
}

pub fn cumulative_stats(sessions: &[SessionResult]) -> CumulativeStats {
    let (total_correct, total_wrong) = sessions
        .iter()
        .map(SessionResult::total)
        .fold((0u64, 0u64), |(c, w), s| {
            (c + u64::from(s.correct), w + u64::from(s.wrong))
        });

    CumulativeStats {
        total_sessions: sessions.len(),
        total_correct,
        total_wrong,
        overall_accuracy: percentage(total_correct, total_correct + total_wrong),
        most_practiced: most_practiced_keys(sessions, MOST_PRACTICED_LIMIT),
    }
}

/// Keys ranked by how many sessions touched them; ties keep first-seen order.
pub fn most_practiced_keys(sessions: &[SessionResult], limit: usize) -> Vec<(Key, usize)> {
    let mut counts: Vec<(Key, usize)> = Vec::new();
    for key in sessions.iter().flat_map(SessionResult::keys) {
        match counts.iter_mut().find(|(k, _)| k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((*key, 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// Accuracy of `position` in `key` across the sessions that practiced `key`,
/// oldest first and numbered from 1.
pub fn progress_series(sessions: &[SessionResult], key: &Key, position: u8) -> Vec<ProgressPoint> {
    sessions
        .iter()
        .filter_map(|s| s.key_scores.get(key).map(|scores| (s.timestamp, scores)))
        .sorted_by_key(|(timestamp, _)| *timestamp)
        .enumerate()
        .map(|(i, (timestamp, scores))| {
            let score = scores.get(position).copied().unwrap_or_default();
            ProgressPoint {
                session_index: i + 1,
                accuracy: score.accuracy(),
                correct: score.correct,
                wrong: score.wrong,
                timestamp,
            }
        })
        .collect()
}

/// All-time scores for each position of `key`.
pub fn key_breakdown(sessions: &[SessionResult], key: &Key) -> PositionScores {
    sessions
        .iter()
        .filter_map(|s| s.key_scores.get(key))
        .fold(PositionScores::default(), |mut acc, scores| {
            acc.merge(scores);
            acc
        })
}

/// All-time total for one key.
pub fn key_total(sessions: &[SessionResult], key: &Key) -> PositionScore {
    key_breakdown(sessions, key).total()
}

pub fn response_time_summary<'a, I>(samples: I) -> Option<ResponseTimeSummary>
where
    I: IntoIterator<Item = &'a ResponseTime>,
{
    let secs: Vec<f64> = samples.into_iter().map(|r| r.seconds).collect();
    let (fastest, slowest) = secs
        .iter()
        .copied()
        .minmax_by(|a, b| a.total_cmp(b))
        .into_option()?;
    Some(ResponseTimeSummary {
        count: secs.len(),
        mean_secs: mean(&secs)?,
        std_dev_secs: std_dev(&secs)?,
        fastest_secs: fastest,
        slowest_secs: slowest,
    })
}

/// Mean response time for each position of `key`, `None` where unanswered.
pub fn average_response_by_position(samples: &[ResponseTime], key: &Key) -> [Option<f64>; 7] {
    let mut averages = [None; 7];
    for (slot, position) in averages.iter_mut().zip(POSITIONS) {
        let secs: Vec<f64> = samples
            .iter()
            .filter(|r| r.key == *key && r.position == position)
            .map(|r| r.seconds)
            .collect();
        *slot = mean(&secs);
    }
    averages
}
