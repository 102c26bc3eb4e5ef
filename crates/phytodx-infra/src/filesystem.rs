//! Data directory layout.

use std::path::{Path, PathBuf};

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PHYTODX_DATA_DIR` environment variable
/// 2. `~/.phytodx`
/// 3. `./.phytodx`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PHYTODX_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".phytodx");
    }

    PathBuf::from(".phytodx")
}

/// Directory holding on-disk session snapshots: `{data_dir}/sessions/`.
pub fn sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_dir_is_nested_under_data_dir() {
        let dir = sessions_dir(Path::new("/tmp/phytodx"));
        assert_eq!(dir, PathBuf::from("/tmp/phytodx/sessions"));
    }
}
