use crate::app_dirs::AppDirs;
use crate::error::StorageError;
use crate::record::{self, format_timestamp, parse_timestamp};
use crate::session::{ResponseTime, SessionResult};
use crate::theory::{Chord, Key};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Number of most recent sessions kept.
pub const RETENTION_CAP: usize = 100;

/// Persistence collaborator for finished sessions.
///
/// Every write is one atomic load → merge → trim → save step. Implementations
/// take `&mut self` for writes, so a store shared between threads has to be
/// wrapped in a lock; `SessionDb` also holds a write lock on the database file
/// for the whole step, which serializes writers in other processes.
pub trait SessionStore {
    /// Every stored session, oldest first.
    fn load_all_sessions(&self) -> Result<Vec<SessionResult>, StorageError>;

    /// Stores `session`, replacing one with the same timestamp, then trims to
    /// [`RETENTION_CAP`].
    fn append_session(&mut self, session: &SessionResult) -> Result<(), StorageError>;

    /// Adds the `incoming` sessions whose timestamp isn't stored yet, then
    /// trims to [`RETENTION_CAP`].
    fn merge_sessions(
        &mut self,
        incoming: Vec<SessionResult>,
    ) -> Result<ImportSummary, StorageError>;
}

/// Sorts oldest first and drops the oldest sessions beyond `cap`.
/// Returns how many were dropped.
pub fn retain_most_recent(sessions: &mut Vec<SessionResult>, cap: usize) -> usize {
    sessions.sort_by_key(|s| s.timestamp);
    let excess = sessions.len().saturating_sub(cap);
    sessions.drain(..excess);
    excess
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Incoming sessions whose timestamp was already stored.
    pub duplicates: usize,
    /// Sessions pushed out by the retention cap.
    pub dropped: usize,
}

/// Decodes `text` and merges it into `store`.
///
/// Nothing is written unless the whole file decodes. Sessions whose timestamp
/// is already stored are skipped.
pub fn import_sessions<S: SessionStore + ?Sized>(
    store: &mut S,
    text: &str,
) -> Result<ImportSummary, StorageError> {
    let incoming = record::decode(text).inspect_err(|e| {
        tracing::warn!("rejected import: {e}");
    })?;

    let summary = store.merge_sessions(incoming)?;

    tracing::info!(
        imported = summary.imported,
        duplicates = summary.duplicates,
        dropped = summary.dropped,
        "import merged"
    );
    Ok(summary)
}

pub fn export_sessions<S: SessionStore + ?Sized>(store: &S) -> Result<String, StorageError> {
    let sessions = store.load_all_sessions()?;
    Ok(record::encode(&sessions)?)
}

/// In-process store, used in tests and when the database can't be opened.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Vec<SessionResult>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load_all_sessions(&self) -> Result<Vec<SessionResult>, StorageError> {
        Ok(self.sessions.clone())
    }

    fn append_session(&mut self, session: &SessionResult) -> Result<(), StorageError> {
        self.sessions.retain(|s| s.timestamp != session.timestamp);
        self.sessions.push(session.clone());
        retain_most_recent(&mut self.sessions, RETENTION_CAP);
        Ok(())
    }

    fn merge_sessions(
        &mut self,
        incoming: Vec<SessionResult>,
    ) -> Result<ImportSummary, StorageError> {
        let mut seen: HashSet<_> = self.sessions.iter().map(|s| s.timestamp).collect();
        let mut summary = ImportSummary::default();
        for session in incoming {
            if seen.insert(session.timestamp) {
                self.sessions.push(session);
                summary.imported += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        summary.dropped = retain_most_recent(&mut self.sessions, RETENTION_CAP);
        Ok(summary)
    }
}

/// SQLite-backed session history.
///
/// Unlike the CSV export, the database keeps each response's own correctness.
#[derive(Debug)]
pub struct SessionDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        timestamp TEXT PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS position_scores (
        session_ts TEXT NOT NULL,
        key_name TEXT NOT NULL,
        position INTEGER NOT NULL,
        correct INTEGER NOT NULL,
        wrong INTEGER NOT NULL,
        PRIMARY KEY (session_ts, key_name, position)
    );
    CREATE TABLE IF NOT EXISTS response_times (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_ts TEXT NOT NULL,
        key_name TEXT NOT NULL,
        position INTEGER NOT NULL,
        chord TEXT NOT NULL,
        is_correct BOOLEAN NOT NULL,
        seconds REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_response_times_session ON response_times(session_ts);
"#;

const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const CLEAR_ALL: &str =
    "DELETE FROM response_times; DELETE FROM position_scores; DELETE FROM sessions;";

impl SessionDb {
    /// Opens the database at the default state location.
    pub fn open_default() -> Result<Self, StorageError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("chordwise_sessions.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Takes the database write lock up front, so the reads inside the
    /// transaction can't go stale before its writes.
    fn write_transaction(&mut self) -> Result<Transaction<'_>, StorageError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn insert(tx: &Transaction<'_>, session: &SessionResult) -> Result<(), StorageError> {
        let ts = format_timestamp(&session.timestamp);
        Self::delete(tx, &ts)?;
        tx.execute("INSERT INTO sessions (timestamp) VALUES (?1)", params![ts])?;

        for (key, scores) in &session.key_scores {
            for (position, score) in scores.iter().filter(|(_, s)| s.attempts() > 0) {
                tx.execute(
                    r#"
                    INSERT INTO position_scores (session_ts, key_name, position, correct, wrong)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![ts, key.to_string(), position, score.correct, score.wrong],
                )?;
            }
        }

        for sample in &session.response_times {
            tx.execute(
                r#"
                INSERT INTO response_times
                    (session_ts, key_name, position, chord, is_correct, seconds)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    ts,
                    sample.key.to_string(),
                    sample.position,
                    sample.chord.to_string(),
                    sample.is_correct,
                    sample.seconds,
                ],
            )?;
        }
        Ok(())
    }

    fn delete(tx: &Transaction<'_>, ts: &str) -> Result<(), StorageError> {
        tx.execute("DELETE FROM response_times WHERE session_ts = ?1", [ts])?;
        tx.execute("DELETE FROM position_scores WHERE session_ts = ?1", [ts])?;
        tx.execute("DELETE FROM sessions WHERE timestamp = ?1", [ts])?;
        Ok(())
    }

    fn trim(tx: &Transaction<'_>, cap: usize) -> Result<usize, StorageError> {
        let stale: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT timestamp FROM sessions ORDER BY timestamp DESC LIMIT -1 OFFSET ?1",
            )?;
            let rows = stmt.query_map([cap as i64], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        for ts in &stale {
            Self::delete(tx, ts)?;
        }
        Ok(stale.len())
    }

    fn load_session(&self, ts: &str) -> Result<SessionResult, StorageError> {
        let timestamp = parse_timestamp(ts)
            .ok_or_else(|| StorageError::Corrupt(format!("bad session timestamp '{ts}'")))?;
        let mut session = SessionResult::new(timestamp);

        let mut stmt = self.conn.prepare(
            "SELECT key_name, position, correct, wrong FROM position_scores WHERE session_ts = ?1",
        )?;
        let rows = stmt.query_map([ts], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;
        for row in rows {
            let (key, position, correct, wrong) = row?;
            let key = parse_key(&key)?;
            let score = session
                .key_scores
                .entry(key)
                .or_default()
                .get_mut(position)
                .ok_or_else(|| StorageError::Corrupt(format!("bad position {position}")))?;
            score.correct = correct;
            score.wrong = wrong;
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT key_name, position, chord, is_correct, seconds
            FROM response_times
            WHERE session_ts = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([ts], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;
        for row in rows {
            let (key, position, chord, is_correct, seconds) = row?;
            session.response_times.push(ResponseTime {
                key: parse_key(&key)?,
                position,
                chord: chord
                    .parse::<Chord>()
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?,
                is_correct,
                seconds,
            });
        }
        Ok(session)
    }

    /// Removes every stored session.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(CLEAR_ALL)?;
        Ok(())
    }
}

fn parse_key(s: &str) -> Result<Key, StorageError> {
    s.parse()
        .map_err(|e: crate::error::TheoryError| StorageError::Corrupt(e.to_string()))
}

impl SessionStore for SessionDb {
    fn load_all_sessions(&self) -> Result<Vec<SessionResult>, StorageError> {
        let timestamps: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT timestamp FROM sessions ORDER BY timestamp ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        timestamps.iter().map(|ts| self.load_session(ts)).collect()
    }

    fn append_session(&mut self, session: &SessionResult) -> Result<(), StorageError> {
        let tx = self.write_transaction()?;
        Self::insert(&tx, session)?;
        let dropped = Self::trim(&tx, RETENTION_CAP)?;
        tx.commit()?;
        if dropped > 0 {
            tracing::debug!(dropped, "trimmed session history");
        }
        Ok(())
    }

    fn merge_sessions(
        &mut self,
        incoming: Vec<SessionResult>,
    ) -> Result<ImportSummary, StorageError> {
        let tx = self.write_transaction()?;
        let mut summary = ImportSummary::default();
        for session in &incoming {
            let ts = format_timestamp(&session.timestamp);
            let stored: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE timestamp = ?1)",
                [&ts],
                |row| row.get(0),
            )?;
            if stored {
                summary.duplicates += 1;
            } else {
                Self::insert(&tx, session)?;
                summary.imported += 1;
            }
        }
        summary.dropped = Self::trim(&tx, RETENTION_CAP)?;
        tx.commit()?;
        Ok(summary)
    }
}
