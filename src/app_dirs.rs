use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `~/.local/state/rekall/state.db`, or the platform data dir when `HOME` is unset.
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("rekall");
            Some(state_dir.join("state.db"))
        } else {
            ProjectDirs::from("", "", "rekall")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("state.db"))
        }
    }
}
