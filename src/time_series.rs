use chrono::{DateTime, Utc};

/// Accuracy for one (key, position) cell in one historical session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPoint {
    /// 1-based rank among the sessions that practiced the key.
    pub session_index: usize,
    pub accuracy: f64,
    pub correct: u32,
    pub wrong: u32,
    pub timestamp: DateTime<Utc>,
}

impl ProgressPoint {
    /// `(session_index, accuracy)` chart coordinates.
    pub fn coords(&self) -> (f64, f64) {
        (self.session_index as f64, self.accuracy)
    }
}

impl From<ProgressPoint> for (f64, f64) {
    fn from(p: ProgressPoint) -> Self {
        p.coords()
    }
}
