//! Shared helpers for snapshot-driven commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use tw_core::{NavigationTiming, TimingEntry};

/// A timing snapshot file: the navigation-timing dump plus optional
/// resource/paint entries.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub timing: NavigationTiming,
    pub entries: Vec<TimingEntry>,
}

/// Reads and parses a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot =
        serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn parses_a_minimal_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"timing": {{"navigationStart": 100, "loadEventEnd": 900}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let snapshot = load_snapshot(file.path()).unwrap();
        assert_eq!(snapshot.timing.navigation_start, 100);
        assert_eq!(snapshot.timing.load_event_end, 900);
        assert!(snapshot.entries.is_empty());
    }

    #[test]
    fn missing_file_reports_the_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("absent.json");
        let err = load_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
