//! Last-selected video, remembered between runs.
//!
//! Stored as `[video-wallpaper settings]` / `LASTFILE="<path>"` so files
//! written by earlier releases keep working.

use std::io;
use std::path::{Path, PathBuf};

use crate::keyfile::KeyFile;
use common::APP_NAME;

const LAST_FILE_KEY: &str = "LASTFILE";

fn group() -> String {
    format!("{} settings", APP_NAME)
}

/// Drop one surrounding pair of double quotes, if present
fn unquote(value: &str) -> &str {
    let value = value.trim_end();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub last_file: Option<PathBuf>,
}

impl Settings {
    /// Read settings, falling back to defaults when the file is unusable
    pub fn load(path: &Path) -> Self {
        let file = match KeyFile::load(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Configuration file could not be read: {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let last_file = file
            .get(&group(), LAST_FILE_KEY)
            .map(unquote)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self { last_file }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        // Keep unrelated keys another tool may have added
        let mut file = KeyFile::load(path).unwrap_or_default();
        let value = self
            .last_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        file.set(&group(), LAST_FILE_KEY, format!("\"{}\"", value));
        file.save(path)
    }
}
