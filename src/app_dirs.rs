use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Where the log file goes; the terminal itself belongs to the UI.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("pomonotes"),
            )
        } else {
            ProjectDirs::from("", "", "pomonotes")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }
}
