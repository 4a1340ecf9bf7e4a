use anyhow::Result;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::autostart::AutostartStore;
use crate::config::{AppDirs, Config};
use crate::dependency::DependencyChecker;
use crate::log_and_continue;
use crate::playback::{LaunchError, PlaybackController};
use common::{
    MissingTool, PlaybackState, StatusReport, VideoPath, VideoPathError, format_missing,
};

/// Successful outcome of a user action, shown as status text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Ready { autostart: bool },
    FileSelected(PathBuf),
    PlaybackRunning,
    PlaybackStopped,
    AutostartEnabled,
    AutostartDisabled,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { autostart: true } => {
                f.write_str("All dependencies fulfilled. Wallpaper autostart is enabled.")
            }
            Self::Ready { autostart: false } => f.write_str("All dependencies fulfilled."),
            Self::FileSelected(path) => write!(f, "Selected {}.", path.display()),
            Self::PlaybackRunning => f.write_str("Playback is running."),
            Self::PlaybackStopped => f.write_str("Playback stopped."),
            Self::AutostartEnabled => f.write_str("Wallpaper autostart enabled."),
            Self::AutostartDisabled => f.write_str("Wallpaper autostart disabled."),
        }
    }
}

/// Failed user action. Nothing here is fatal; the previous state is kept.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("missing dependencies: {}. Please run the installer again.", format_missing(.0))]
    MissingDependency(Vec<MissingTool>),

    #[error("No video file selected.")]
    NoFileSelected,

    #[error("invalid video file: {0}")]
    InvalidVideo(#[from] VideoPathError),

    #[error("could not start playback ({0})")]
    Launch(#[from] LaunchError),

    #[error("could not update autostart entry: {0}")]
    Autostart(#[source] io::Error),
}

pub type Outcome = Result<StatusMessage, ManagerError>;

/// Turns user intents into launcher calls and autostart updates.
///
/// Controls stay enabled until [`WallpaperManager::initialize`] reports
/// missing tools; after that, start, stop and autostart changes are
/// refused until a later `initialize` succeeds.
#[derive(Debug)]
pub struct WallpaperManager {
    checker: DependencyChecker,
    playback: PlaybackController,
    autostart: AutostartStore,
    selected: Option<PathBuf>,
    missing: Vec<MissingTool>,
}

impl WallpaperManager {
    pub fn new(
        checker: DependencyChecker,
        playback: PlaybackController,
        autostart: AutostartStore,
    ) -> Self {
        Self {
            checker,
            playback,
            autostart,
            selected: None,
            missing: Vec::new(),
        }
    }

    pub fn from_config(config: &Config, dirs: &AppDirs) -> Result<Self> {
        Ok(Self::new(
            DependencyChecker::from_config(config, dirs)?,
            PlaybackController::from_config(config, dirs)?,
            AutostartStore::from_config(config, dirs)?,
        ))
    }

    /// Restore a remembered selection without validating it.
    ///
    /// Every action re-validates, so a stale path only matters once used.
    pub fn with_selection(mut self, selected: Option<PathBuf>) -> Self {
        self.selected = selected.filter(|p| !p.as_os_str().is_empty());
        self
    }

    /// Check dependencies and report the initial autostart state
    pub fn initialize(&mut self) -> Outcome {
        self.missing = self.checker.check();

        if !self.missing.is_empty() {
            log::warn!("Controls disabled: {}", format_missing(&self.missing));
            return Err(ManagerError::MissingDependency(self.missing.clone()));
        }

        Ok(StatusMessage::Ready {
            autostart: self.autostart.is_enabled(),
        })
    }

    /// Remember `path` and keep an enabled autostart entry pointing at it.
    ///
    /// Playback is not restarted; a running wallpaper keeps its file until
    /// the next start or login. If the autostart entry cannot be updated,
    /// the previous selection is kept.
    pub fn on_file_selected(&mut self, path: impl AsRef<Path>) -> Outcome {
        let video = VideoPath::new(path)?;

        if !self.controls_enabled() {
            log::debug!("Skipping autostart update while controls are disabled");
        } else if self.autostart.is_enabled() {
            self.autostart
                .write(true, &video)
                .map_err(ManagerError::Autostart)?;
        }

        log::info!("Selected video file: {}", video);
        let path = video.into_path_buf();
        self.selected = Some(path.clone());
        Ok(StatusMessage::FileSelected(path))
    }

    pub fn on_start(&self) -> Outcome {
        self.ensure_controls_enabled()?;
        let video = self.selected_video()?;

        self.playback.start(&video)?;
        Ok(StatusMessage::PlaybackRunning)
    }

    /// Always reports stopped; a failing launcher is only logged
    pub fn on_stop(&self) -> Outcome {
        self.ensure_controls_enabled()?;

        log_and_continue!(self.playback.stop(), "stop playback");
        Ok(StatusMessage::PlaybackStopped)
    }

    pub fn on_autostart_toggled(&self, enable: bool) -> Outcome {
        self.ensure_controls_enabled()?;
        let video = self.selected_video()?;

        if enable {
            self.autostart
                .write(true, &video)
                .map_err(ManagerError::Autostart)?;
            Ok(StatusMessage::AutostartEnabled)
        } else {
            self.autostart.clear().map_err(ManagerError::Autostart)?;
            Ok(StatusMessage::AutostartDisabled)
        }
    }

    pub fn selected(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn controls_enabled(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_tools(&self) -> &[MissingTool] {
        &self.missing
    }

    pub fn autostart_enabled(&self) -> bool {
        self.autostart.is_enabled()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            selected: self.selected.clone(),
            playback: self.playback_state(),
            autostart: self.autostart.status(),
            missing_tools: self.missing.clone(),
            controls_enabled: self.controls_enabled(),
        }
    }

    fn ensure_controls_enabled(&self) -> Result<(), ManagerError> {
        if self.controls_enabled() {
            Ok(())
        } else {
            Err(ManagerError::MissingDependency(self.missing.clone()))
        }
    }

    /// Current selection, re-validated against the filesystem
    fn selected_video(&self) -> Result<VideoPath, ManagerError> {
        let path = self.selected.as_ref().ok_or(ManagerError::NoFileSelected)?;

        VideoPath::new(path).map_err(|e| {
            log::warn!("Selected video is no longer usable: {}", e);
            ManagerError::NoFileSelected
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{LaunchCommand, ProcessSignature};
    use std::fs;

    fn manager(dir: &Path) -> WallpaperManager {
        let helper = dir.join("xwinwrap");
        fs::write(&helper, b"").unwrap();

        WallpaperManager::new(
            DependencyChecker::with_search_path(Vec::new(), helper, Vec::new()),
            PlaybackController::new(
                LaunchCommand::new("/bin/true"),
                ProcessSignature::new(Vec::new()),
            ),
            AutostartStore::new(
                dir.join("autostart/video-wallpaper.desktop"),
                LaunchCommand::new("/bin/true"),
            ),
        )
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(StatusMessage::PlaybackRunning.to_string(), "Playback is running.");
        assert_eq!(StatusMessage::PlaybackStopped.to_string(), "Playback stopped.");
        assert_eq!(
            StatusMessage::AutostartEnabled.to_string(),
            "Wallpaper autostart enabled."
        );
        assert_eq!(
            StatusMessage::AutostartDisabled.to_string(),
            "Wallpaper autostart disabled."
        );
        assert_eq!(
            ManagerError::NoFileSelected.to_string(),
            "No video file selected."
        );
    }

    #[test]
    fn test_missing_dependency_message_lists_tools() {
        let err = ManagerError::MissingDependency(vec![
            MissingTool::on_search_path("mpv"),
            MissingTool::at("xwinwrap", "/opt/xwinwrap"),
        ]);
        assert_eq!(
            err.to_string(),
            "missing dependencies: mpv, xwinwrap. Please run the installer again."
        );
    }

    #[test]
    fn test_with_selection_ignores_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path()).with_selection(Some(PathBuf::new()));
        assert_eq!(manager.selected(), None);
    }

    #[test]
    fn test_stale_selection_is_no_file_selected() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            manager(dir.path()).with_selection(Some(dir.path().join("deleted.mp4")));

        assert!(matches!(
            manager.on_start(),
            Err(ManagerError::NoFileSelected)
        ));
        assert!(matches!(
            manager.on_autostart_toggled(true),
            Err(ManagerError::NoFileSelected)
        ));
    }

    #[test]
    fn test_invalid_selection_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"video").unwrap();

        let mut manager = manager(dir.path());
        manager.on_file_selected(&video).unwrap();

        assert!(matches!(
            manager.on_file_selected(dir.path().join("missing.mp4")),
            Err(ManagerError::InvalidVideo(VideoPathError::NotFound(_)))
        ));
        assert!(matches!(
            manager.on_file_selected(""),
            Err(ManagerError::InvalidVideo(VideoPathError::Empty))
        ));
        assert_eq!(manager.selected(), Some(video.as_path()));
    }

    #[test]
    fn test_failed_autostart_update_keeps_selection() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.mp4");
        fs::write(&first, b"video").unwrap();
        // Desktop entries cannot hold this name
        let second = dir.path().join(OsStr::from_bytes(b"second\xFF.mp4"));
        fs::write(&second, b"video").unwrap();

        let mut manager = manager(dir.path());
        manager.initialize().unwrap();
        manager.on_file_selected(&first).unwrap();
        manager.on_autostart_toggled(true).unwrap();

        assert!(matches!(
            manager.on_file_selected(&second),
            Err(ManagerError::Autostart(_))
        ));
        assert_eq!(manager.selected(), Some(first.as_path()));
        assert_eq!(manager.status_report().autostart.video, Some(first));
    }

    #[test]
    fn test_initialize_reports_autostart_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());

        assert_eq!(
            manager.initialize().unwrap(),
            StatusMessage::Ready { autostart: false }
        );
        assert!(manager.controls_enabled());
        assert!(manager.missing_tools().is_empty());
    }

    #[test]
    fn test_status_report() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"video").unwrap();

        let mut manager = manager(dir.path());
        manager.initialize().unwrap();
        manager.on_file_selected(&video).unwrap();
        manager.on_autostart_toggled(true).unwrap();

        let report = manager.status_report();
        assert_eq!(report.selected, Some(video.clone()));
        assert_eq!(report.playback, PlaybackState::Stopped);
        assert!(report.autostart.enabled);
        assert_eq!(report.autostart.video, Some(video));
        assert!(report.controls_enabled);
    }
}
