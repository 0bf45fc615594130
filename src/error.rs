//! Error types for the drill engine.
//!
//! Engine errors (`TheoryError`) mean a caller handed the engine something it
//! can't spell. Configuration, import and storage errors are meant to be shown
//! to the user.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TheoryError {
    #[error("position {0} is outside 1..=7")]
    InvalidPosition(u8),

    #[error("invalid note '{0}'")]
    InvalidNote(String),

    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("invalid chord '{0}'")]
    InvalidChord(String),

    /// The degree would need more than two accidentals (e.g. a `B##` major scale).
    #[error("position {position} of {key} cannot be spelled with at most two accidentals")]
    Unspellable { key: String, position: u8 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("select at least one major or minor key")]
    NoKeysSelected,

    #[error("questions per key must be at least 1 (got {0})")]
    InvalidQuestionCount(u32),

    #[error("delay must be 0 (untimed) or between 0.5 and 20 seconds (got {0})")]
    InvalidDelay(f64),

    #[error("key {key} is not supported: {source}")]
    UnsupportedKey {
        key: String,
        #[source]
        source: TheoryError,
    },
}

/// Import failures. Every variant rejects the whole file.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("the file is empty")]
    Empty,

    #[error("unrecognised header '{found}'")]
    BadHeader { found: String },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {column} '{value}': {reason}")]
    InvalidField {
        line: u64,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("line {line}: duplicate row for {key} position {position}")]
    DuplicateRow { line: u64, key: String, position: u8 },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("import failed: {0}")]
    Import(#[from] ImportError),
}
