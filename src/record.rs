//! CSV export/import of session history.
//!
//! One row per (session, key, position) cell with at least one attempt:
//!
//! ```text
//! Timestamp,Key,Position,Correct,Wrong,TimeSeconds
//! 2025-10-23T14:30:00Z,C,1,5,2,2.34;1.87;3.45;2.12;1.95;2.67;2.51
//! ```
//!
//! Older exports lack the `TimeSeconds` column. Rows with no attempts are
//! skipped on import.
//!
//! A round trip through the CSV is lossy in three ways, all captured by
//! [`normalize`]:
//! - response times are regrouped by cell, in `Key` then position order,
//!   keeping their order within a cell;
//! - times are rounded to two decimals;
//! - the CSV does not say which response time belonged to a correct answer,
//!   so the first `Correct` samples of a cell are taken as correct and the
//!   rest as wrong.

use crate::error::ImportError;
use crate::session::{ResponseTime, SessionResult};
use crate::theory::{Key, POSITIONS};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use itertools::Itertools;
use std::collections::HashSet;

pub const LEGACY_HEADER: [&str; 5] = ["Timestamp", "Key", "Position", "Correct", "Wrong"];
pub const HEADER: [&str; 6] = [
    "Timestamp",
    "Key",
    "Position",
    "Correct",
    "Wrong",
    "TimeSeconds",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the exact export form, `2025-10-23T14:30:00Z`. Fractional seconds
/// and other offsets are rejected.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.2}")
}

/// Writes `sessions` in the current six-column format.
pub fn encode(sessions: &[SessionResult]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);
    writer.write_record(HEADER)?;

    for session in sessions {
        let timestamp = format_timestamp(&session.timestamp);
        for (key, scores) in &session.key_scores {
            for (position, score) in scores.iter().filter(|(_, s)| s.attempts() > 0) {
                let times = session
                    .response_times
                    .iter()
                    .filter(|r| r.key == *key && r.position == position)
                    .map(|r| format_seconds(r.seconds))
                    .join(";");
                writer.write_record([
                    timestamp.clone(),
                    key.to_string(),
                    position.to_string(),
                    score.correct.to_string(),
                    score.wrong.to_string(),
                    times,
                ])?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses an export back into sessions, in order of first appearance.
///
/// Any bad row rejects the whole input.
pub fn decode(text: &str) -> Result<Vec<SessionResult>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = records.next().ok_or(ImportError::Empty)??;
    let columns = if header.iter().eq(HEADER) {
        HEADER.len()
    } else if header.iter().eq(LEGACY_HEADER) {
        LEGACY_HEADER.len()
    } else {
        return Err(ImportError::BadHeader {
            found: header.iter().join(","),
        });
    };

    let mut sessions: Vec<SessionResult> = Vec::new();
    let mut seen = HashSet::new();
    for (index, record) in records.enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        if record.len() != columns {
            return Err(ImportError::ColumnCount {
                line,
                expected: columns,
                found: record.len(),
            });
        }

        let row = parse_row(&record, line)?;
        if !seen.insert((row.timestamp, row.key, row.position)) {
            return Err(ImportError::DuplicateRow {
                line,
                key: row.key.to_string(),
                position: row.position,
            });
        }
        if row.correct == 0 && row.wrong == 0 {
            continue;
        }
        let index = match sessions.iter().position(|s| s.timestamp == row.timestamp) {
            Some(i) => i,
            None => {
                sessions.push(SessionResult::new(row.timestamp));
                sessions.len() - 1
            }
        };
        apply_row(&mut sessions[index], row, line)?;
    }

    Ok(sessions)
}

/// What `decode(encode(..))` gives back for `session`.
pub fn normalize(session: &SessionResult) -> SessionResult {
    let mut normalized = SessionResult::new(session.timestamp);
    normalized.key_scores = session.key_scores.clone();
    for (key, scores) in &session.key_scores {
        for (position, score) in scores.iter() {
            let correct = score.correct as usize;
            let cell = session
                .response_times
                .iter()
                .filter(|r| r.key == *key && r.position == position)
                .enumerate()
                .map(|(i, r)| ResponseTime {
                    is_correct: i < correct,
                    seconds: format_seconds(r.seconds).parse().unwrap_or(r.seconds),
                    ..r.clone()
                });
            normalized.response_times.extend(cell);
        }
    }
    normalized
}

struct Row {
    timestamp: DateTime<Utc>,
    key: Key,
    position: u8,
    correct: u32,
    wrong: u32,
    times: Vec<f64>,
}

fn invalid(line: u64, column: &'static str, value: &str, reason: impl ToString) -> ImportError {
    ImportError::InvalidField {
        line,
        column,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_row(record: &csv::StringRecord, line: u64) -> Result<Row, ImportError> {
    let timestamp = parse_timestamp(&record[0])
        .ok_or_else(|| invalid(line, "Timestamp", &record[0], "expected ISO-8601 UTC"))?;
    let key: Key = record[1]
        .parse()
        .map_err(|e| invalid(line, "Key", &record[1], e))?;
    let position: u8 = record[2]
        .parse()
        .ok()
        .filter(|p| POSITIONS.contains(p))
        .ok_or_else(|| invalid(line, "Position", &record[2], "expected 1..=7"))?;
    let correct: u32 = record[3]
        .parse()
        .map_err(|e| invalid(line, "Correct", &record[3], e))?;
    let wrong: u32 = record[4]
        .parse()
        .map_err(|e| invalid(line, "Wrong", &record[4], e))?;

    let times = match record.get(5) {
        None | Some("") => vec![],
        Some(field) => field
            .split(';')
            .map(|t| {
                t.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .ok_or_else(|| invalid(line, "TimeSeconds", t, "expected seconds"))
            })
            .collect::<Result<_, _>>()?,
    };

    Ok(Row {
        timestamp,
        key,
        position,
        correct,
        wrong,
        times,
    })
}

/// Fills one cell of `session`; the caller has already rejected repeated cells.
fn apply_row(session: &mut SessionResult, row: Row, line: u64) -> Result<(), ImportError> {
    let scores = session.key_scores.entry(row.key).or_default();
    let Some(score) = scores.get_mut(row.position) else {
        return Err(invalid(line, "Position", &row.position.to_string(), "expected 1..=7"));
    };
    score.correct = row.correct;
    score.wrong = row.wrong;

    let chord = row
        .key
        .chord_at(row.position)
        .map_err(|e| invalid(line, "Key", &row.key.to_string(), e))?;
    let correct = row.correct as usize;
    session
        .response_times
        .extend(row.times.into_iter().enumerate().map(|(i, seconds)| ResponseTime {
            key: row.key,
            position: row.position,
            chord,
            is_correct: i < correct,
            seconds,
        }));
    Ok(())
}
