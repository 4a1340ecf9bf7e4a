//! Start/stop control of the wallpaper rendering process.
//!
//! The rendering pipeline outlives this program, so nothing here holds a
//! child handle. Every action goes through the external launcher and every
//! status query re-resolves the process from the OS process table.

use anyhow::Result;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use sysinfo::{
    Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind,
};
use thiserror::Error;

use crate::config::{AppDirs, Config};
use common::{PlaybackState, VideoPath};

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to run launcher {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("launcher {0}")]
    Failed(ExitStatus),
}

#[derive(Error, Debug)]
pub enum StopError {
    #[error("failed to run launcher {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("launcher {0}")]
    Failed(ExitStatus),
}

/// Program plus leading arguments used to reach the launcher.
///
/// Leading arguments let the launcher run through an interpreter, e.g.
/// `/bin/sh /usr/share/video-wallpaper/video-wallpaper.sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn run<I, S>(&self, extra: I) -> io::Result<ExitStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(extra).stdin(Stdio::null());

        log::debug!("Running launcher: {:?}", command);
        command.status()
    }
}

/// How the rendering process is recognised in the process table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignature {
    names: Vec<String>,
    pid_file: Option<PathBuf>,
}

impl ProcessSignature {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            pid_file: None,
        }
    }

    pub fn with_pid_file(mut self, pid_file: Option<PathBuf>) -> Self {
        self.pid_file = pid_file;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    /// Query the OS for a live matching process.
    ///
    /// A PID from the PID file only counts when that process passes the
    /// same owner and name checks as the process table scan, so a reused
    /// PID is not mistaken for the renderer.
    pub fn is_alive(&self) -> bool {
        let mut system = System::new();
        let refresh = ProcessRefreshKind::nothing().with_user(UpdateKind::OnlyIfNotSet);
        let uid = common::current_uid();

        if let Some(pid) = self.recorded_pid() {
            system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);
            match system.process(pid) {
                Some(process) if self.matches(process, uid) => {
                    log::debug!("Rendering process {} from PID file is alive", pid);
                    return true;
                }
                Some(process) => log::debug!(
                    "PID file names {} ({:?}), which is not the renderer",
                    pid,
                    process.name()
                ),
                None => {}
            }
        }

        if self.names.is_empty() {
            return false;
        }

        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

        let found = system
            .processes()
            .values()
            .find(|p| self.matches(p, uid));

        match found {
            Some(process) => {
                log::debug!(
                    "Found rendering process {:?} (pid {})",
                    process.name(),
                    process.pid()
                );
                true
            }
            None => false,
        }
    }

    /// Live, owned by `uid`, and named like the renderer. With no names
    /// configured only the PID file can identify it, so any name passes.
    fn matches(&self, process: &Process, uid: u32) -> bool {
        process.status() != ProcessStatus::Zombie
            && process.user_id().is_none_or(|owner| **owner == uid)
            && (self.names.is_empty() || self.names.iter().any(|n| process.name() == OsStr::new(n)))
    }

    fn recorded_pid(&self) -> Option<Pid> {
        let path = self.pid_file.as_ref()?;
        let contents = fs::read_to_string(path).ok()?;

        match contents.trim().parse::<u32>() {
            Ok(pid) => Some(Pid::from_u32(pid)),
            Err(e) => {
                log::debug!("Ignoring malformed PID file {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Drives the launcher and reports whether playback is live.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    launcher: LaunchCommand,
    signature: ProcessSignature,
}

impl PlaybackController {
    pub fn new(launcher: LaunchCommand, signature: ProcessSignature) -> Self {
        Self {
            launcher,
            signature,
        }
    }

    pub fn from_config(config: &Config, dirs: &AppDirs) -> Result<Self> {
        Ok(Self::new(
            config.launch_command(dirs)?,
            config.process_signature()?,
        ))
    }

    pub fn launcher(&self) -> &LaunchCommand {
        &self.launcher
    }

    /// Launch playback of `video` in the background.
    ///
    /// Success means the launcher exited with status 0. The player may
    /// still die afterwards; use [`Self::is_running`] to find out.
    pub fn start(&self, video: &VideoPath) -> Result<(), LaunchError> {
        log::info!("Starting wallpaper playback: {}", video);

        let args = [
            OsStr::new("--start"),
            OsStr::new("--video-file"),
            video.as_path().as_os_str(),
        ];
        let status = self.launcher.run(args).map_err(|source| LaunchError::Spawn {
            program: self.launcher.program.clone(),
            source,
        })?;

        if !status.success() {
            log::error!("Launcher failed to start playback: {}", status);
            return Err(LaunchError::Failed(status));
        }

        Ok(())
    }

    /// Ask the launcher to terminate any rendering process.
    ///
    /// Whether something was running is the launcher's concern; an idle
    /// stop is expected to exit 0.
    pub fn stop(&self) -> Result<(), StopError> {
        log::info!("Stopping wallpaper playback");

        let status = self
            .launcher
            .run(["--stop"])
            .map_err(|source| StopError::Spawn {
                program: self.launcher.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(StopError::Failed(status));
        }

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.signature.is_alive()
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_running() {
            PlaybackState::Running
        } else {
            PlaybackState::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_SUCH_PROCESS: &str = "vw-test-nonexistent-renderer";

    /// Launcher script run through `/bin/sh` that records its arguments
    fn fake_launcher(dir: &Path, exit_code: i32) -> LaunchCommand {
        let script = dir.join("launcher.sh");
        fs::write(
            &script,
            format!(
                "echo \"$@\" >> \"$(dirname \"$0\")/calls.log\"\nexit {}\n",
                exit_code
            ),
        )
        .unwrap();

        LaunchCommand::new("/bin/sh").with_args(vec![script.display().to_string()])
    }

    fn calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    fn controller(launcher: LaunchCommand) -> PlaybackController {
        PlaybackController::new(
            launcher,
            ProcessSignature::new(vec![NO_SUCH_PROCESS.to_string()]),
        )
    }

    fn video(dir: &Path) -> VideoPath {
        let path = dir.join("clip.mp4");
        fs::write(&path, b"video").unwrap();
        VideoPath::new(path).unwrap()
    }

    #[test]
    fn test_start_passes_video_to_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let playback = controller(fake_launcher(dir.path(), 0));
        let video = video(dir.path());

        playback.start(&video).unwrap();

        assert_eq!(
            calls(dir.path()),
            vec![format!("--start --video-file {}", video)]
        );
    }

    #[test]
    fn test_start_nonzero_exit_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let playback = controller(fake_launcher(dir.path(), 3));
        let video = video(dir.path());

        match playback.start(&video) {
            Err(LaunchError::Failed(status)) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected launch failure, got {:?}", other),
        }
    }

    #[test]
    fn test_start_missing_launcher_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let playback = controller(LaunchCommand::new(dir.path().join("missing.sh")));
        let video = video(dir.path());

        assert!(matches!(
            playback.start(&video),
            Err(LaunchError::Spawn { .. })
        ));
    }

    #[test]
    fn test_stop_invokes_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let playback = controller(fake_launcher(dir.path(), 0));

        playback.stop().unwrap();
        playback.stop().unwrap();

        assert_eq!(calls(dir.path()), vec!["--stop", "--stop"]);
    }

    #[test]
    fn test_stop_nonzero_exit_is_stop_error() {
        let dir = tempfile::tempdir().unwrap();
        let playback = controller(fake_launcher(dir.path(), 1));

        assert!(matches!(playback.stop(), Err(StopError::Failed(_))));
    }

    #[test]
    fn test_leading_args_come_first() {
        let launcher = LaunchCommand::new("/bin/sh").with_args(vec!["-c".into(), "exit 0".into()]);
        assert_eq!(launcher.program(), Path::new("/bin/sh"));
        assert_eq!(launcher.args(), ["-c".to_string(), "exit 0".to_string()]);
        assert!(launcher.run(["ignored"]).unwrap().success());
    }

    #[test]
    fn test_not_running_without_match() {
        let playback = controller(LaunchCommand::new("/bin/true"));
        assert!(!playback.is_running());
        assert_eq!(playback.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_pid_file_with_live_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("renderer.pid");
        fs::write(&pid_file, format!("{}\n", std::process::id())).unwrap();

        let signature = ProcessSignature::new(Vec::new()).with_pid_file(Some(pid_file));
        let playback = PlaybackController::new(LaunchCommand::new("/bin/true"), signature);

        assert!(playback.is_running());
        assert_eq!(playback.state(), PlaybackState::Running);
    }

    /// Short-lived stand-in for the renderer, killed on drop
    struct Sleeper(std::process::Child);

    impl Sleeper {
        fn spawn() -> Self {
            Self(Command::new("sleep").arg("30").spawn().unwrap())
        }

        fn pid(&self) -> u32 {
            self.0.id()
        }
    }

    impl Drop for Sleeper {
        fn drop(&mut self) {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }

    #[test]
    fn test_process_found_by_name() {
        let _sleeper = Sleeper::spawn();

        let playback = PlaybackController::new(
            LaunchCommand::new("/bin/true"),
            ProcessSignature::new(vec!["sleep".to_string()]),
        );

        assert!(playback.is_running());
        assert_eq!(playback.state(), PlaybackState::Running);
    }

    #[test]
    fn test_reused_pid_with_other_name_is_not_alive() {
        let dir = tempfile::tempdir().unwrap();
        let sleeper = Sleeper::spawn();
        let pid_file = dir.path().join("renderer.pid");
        fs::write(&pid_file, format!("{}\n", sleeper.pid())).unwrap();

        let signature = ProcessSignature::new(vec![NO_SUCH_PROCESS.to_string()])
            .with_pid_file(Some(pid_file.clone()));
        assert!(!signature.is_alive());

        let signature = ProcessSignature::new(vec!["sleep".to_string()]).with_pid_file(Some(pid_file));
        assert!(signature.is_alive());
    }

    #[test]
    fn test_pid_file_malformed_or_missing() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("renderer.pid");

        let signature = ProcessSignature::new(Vec::new()).with_pid_file(Some(pid_file.clone()));
        assert!(!signature.is_alive());

        fs::write(&pid_file, "not a pid").unwrap();
        assert!(!signature.is_alive());
    }
}
