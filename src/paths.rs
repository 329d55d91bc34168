//! XDG directory helpers for config/data locations.

use std::path::PathBuf;

/// Base directory for persistent data (journal, payloads, leader lock).
///
/// Uses `SNAPGC_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/snapgc` or
/// `~/.local/share/snapgc`.
pub(crate) fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SNAPGC_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local")
                .join("share")
        })
        .join("snapgc")
}

/// Base directory for configuration files.
///
/// Uses `SNAPGC_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/snapgc` or
/// `~/.config/snapgc`.
pub(crate) fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SNAPGC_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("snapgc")
}
