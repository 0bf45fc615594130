use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "chordwise";

/// On-disk locations for session history and settings
pub struct AppDirs;

impl AppDirs {
    /// Session database, under `~/.local/state/chordwise` when `HOME` is set.
    pub fn db_path() -> Option<PathBuf> {
        let dir = match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".local").join("state").join(APP_NAME),
            None => Self::project()?.data_local_dir().to_path_buf(),
        };
        Some(dir.join("sessions.db"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Some(Self::project()?.config_dir().join("config.json"))
    }

    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }
}
