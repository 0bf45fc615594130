// Library surface for the drill engine, shared by the binary and integration tests.
// Presentation concerns stay in main.rs.
pub mod app_dirs;
pub mod config;
pub mod drill;
pub mod error;
pub mod record;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod store;
pub mod theory;
pub mod time_series;
pub mod util;

pub use config::{ConfigStore, FileConfigStore, Settings};
pub use drill::{DrillSession, DrillState, Progress, SubmitOutcome, TickOutcome};
pub use error::{ConfigError, ImportError, StorageError, TheoryError};
pub use session::{KeyScores, PositionScore, PositionScores, ResponseTime, SessionResult};
pub use store::{MemorySessionStore, SessionDb, SessionStore};
pub use theory::{Chord, Key, Mode, Note, Quality};
