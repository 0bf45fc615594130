use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::theory::{Key, Letter, Note};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Question counts offered to the user.
pub const QUESTION_COUNT_CHOICES: [u32; 7] = [5, 10, 15, 20, 25, 30, 40];

/// Allowed per-question time budget. A delay of exactly 0 means untimed.
pub const DELAY_RANGE_SECS: RangeInclusive<f64> = 0.5..=20.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub major_keys: Vec<Note>,
    pub minor_keys: Vec<Note>,
    pub questions_per_key: u32,
    pub delay_seconds: f64,
    pub limit_choices_to_key: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            major_keys: vec![Note::natural(Letter::C)],
            minor_keys: vec![],
            questions_per_key: 10,
            delay_seconds: 5.0,
            limit_choices_to_key: true,
        }
    }
}

impl Settings {
    pub fn is_timed(&self) -> bool {
        self.delay_seconds > 0.0
    }

    /// Selected major keys in selection order, then selected minor keys.
    /// Repeated selections keep their first position.
    pub fn ordered_keys(&self) -> Vec<Key> {
        self.major_keys
            .iter()
            .map(|&root| Key::major(root))
            .chain(self.minor_keys.iter().map(|&root| Key::minor(root)))
            .unique()
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.major_keys.is_empty() && self.minor_keys.is_empty() {
            return Err(ConfigError::NoKeysSelected);
        }
        if self.questions_per_key == 0 {
            return Err(ConfigError::InvalidQuestionCount(self.questions_per_key));
        }
        if self.delay_seconds != 0.0 && !DELAY_RANGE_SECS.contains(&self.delay_seconds) {
            return Err(ConfigError::InvalidDelay(self.delay_seconds));
        }
        for key in self.ordered_keys() {
            key.scale().map_err(|source| ConfigError::UnsupportedKey {
                key: key.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("chordwise_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable settings: {e}");
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}
