//! Common types and utilities for video-wallpaper.
//!
//! This crate defines the value types shared between the lifecycle
//! supervisor library and the `video-wallpaper` command-line front end.
//!
//! # Examples
//!
//! ```no_run
//! use common::VideoPath;
//!
//! // Only existing regular files become a `VideoPath`
//! let video = VideoPath::new("/home/me/Videos/waves.mp4").unwrap();
//! println!("selected {}", video);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name used for config directories, autostart entries and runtime files.
pub const APP_NAME: &str = "video-wallpaper";

/// Why a path could not be accepted as a video file.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoPathError {
    #[error("no path given")]
    Empty,

    #[error("file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
}

/// Absolute path to an existing regular file.
///
/// Existence is checked at construction time only. Callers that hold on to
/// a selection across user actions re-validate with [`VideoPath::new`]
/// before using it, since the file can disappear in between.
///
/// # Examples
///
/// ```
/// use common::{VideoPath, VideoPathError};
///
/// assert_eq!(VideoPath::new(""), Err(VideoPathError::Empty));
/// assert!(VideoPath::new("/definitely/not/here.mp4").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoPath(PathBuf);

impl VideoPath {
    /// Validate `path` and make it absolute against the current directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self, VideoPathError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(VideoPathError::Empty);
        }

        let absolute =
            std::path::absolute(path).map_err(|_| VideoPathError::NotFound(path.to_path_buf()))?;

        match std::fs::metadata(&absolute) {
            Ok(meta) if meta.is_file() => Ok(Self(absolute)),
            Ok(_) => Err(VideoPathError::NotAFile(absolute)),
            Err(_) => Err(VideoPathError::NotFound(absolute)),
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for VideoPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for VideoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Where a required tool was expected to be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolLocation {
    /// Resolved through the executable search path (`PATH`)
    SearchPath,
    /// A fixed file location, e.g. a helper shipped next to the program
    File(PathBuf),
}

/// A required external tool that could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTool {
    pub name: String,
    pub location: ToolLocation,
}

impl MissingTool {
    pub fn on_search_path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: ToolLocation::SearchPath,
        }
    }

    pub fn at(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: ToolLocation::File(path.into()),
        }
    }
}

impl fmt::Display for MissingTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Join tool names for a status line, e.g. `"mpv, xwinwrap"`
pub fn format_missing(tools: &[MissingTool]) -> String {
    tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a rendering process is currently alive.
///
/// Never stored: always derived from a fresh OS query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Running,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Autostart declaration as seen by a status query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutostartStatus {
    pub enabled: bool,
    pub video: Option<PathBuf>,
}

/// Snapshot of everything the front end displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub version: String,
    pub selected: Option<PathBuf>,
    pub playback: PlaybackState,
    pub autostart: AutostartStatus,
    pub missing_tools: Vec<MissingTool>,
    pub controls_enabled: bool,
}

/// Numeric id of the user running this process
pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}
