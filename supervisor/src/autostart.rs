//! Persisted autostart declaration (freedesktop desktop entry).
//!
//! The file on disk is the only source of truth: nothing is cached between
//! calls, so edits made by other programs are picked up on the next read.

use anyhow::Result;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{AppDirs, Config};
use crate::keyfile::KeyFile;
use crate::playback::LaunchCommand;
use common::{AutostartStatus, VideoPath};

const GROUP: &str = "Desktop Entry";
const ENABLED_KEY: &str = "X-GNOME-Autostart-enabled";
const VIDEO_KEY: &str = "X-Video-Wallpaper-File";

/// Contents of the autostart entry that matter to the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutostartDeclaration {
    pub enabled: bool,
    pub video: PathBuf,
}

/// Why a declaration could not be read. Only ever logged.
#[derive(Error, Debug)]
enum DeclarationError {
    #[error("cannot read: {0}")]
    Io(#[from] io::Error),

    #[error("missing key {0}")]
    MissingKey(&'static str),

    #[error("autostart flag is not a boolean: {0:?}")]
    InvalidFlag(String),
}

/// Reads and writes the login-time autostart entry.
#[derive(Debug, Clone)]
pub struct AutostartStore {
    file: PathBuf,
    launcher: LaunchCommand,
}

impl AutostartStore {
    pub fn new(file: impl Into<PathBuf>, launcher: LaunchCommand) -> Self {
        Self {
            file: file.into(),
            launcher,
        }
    }

    pub fn from_config(config: &Config, dirs: &AppDirs) -> Result<Self> {
        Ok(Self::new(
            config.autostart_file(dirs)?,
            config.launch_command(dirs)?,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// `false` when the entry is absent or malformed
    pub fn is_enabled(&self) -> bool {
        self.declaration().is_some_and(|d| d.enabled)
    }

    /// Current declaration, or `None` when absent or malformed
    pub fn declaration(&self) -> Option<AutostartDeclaration> {
        match self.read() {
            Ok(declaration) => Some(declaration),
            Err(DeclarationError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::debug!(
                    "Treating autostart entry {} as not configured: {}",
                    self.file.display(),
                    e
                );
                None
            }
        }
    }

    pub fn status(&self) -> AutostartStatus {
        match self.declaration() {
            Some(declaration) => AutostartStatus {
                enabled: declaration.enabled,
                video: Some(declaration.video),
            },
            None => AutostartStatus::default(),
        }
    }

    /// Replace the entry with one pointing at `video`.
    ///
    /// The caller guarantees `video` was validated just before.
    ///
    /// Desktop entries are UTF-8, so a path that is not valid UTF-8 is
    /// rejected with [`io::ErrorKind::InvalidData`] and nothing is written.
    pub fn write(&self, enabled: bool, video: &VideoPath) -> io::Result<()> {
        let video_arg = utf8_path(video.as_path())?;
        let program = utf8_path(self.launcher.program())?;

        let mut exec: Vec<String> = Vec::with_capacity(self.launcher.args().len() + 4);
        exec.push(quote_exec_arg(program));
        exec.extend(self.launcher.args().iter().map(|a| quote_exec_arg(a)));
        exec.push("--start".to_string());
        exec.push("--video-file".to_string());
        exec.push(quote_exec_arg(video_arg));

        let mut entry = KeyFile::new();
        entry.set(GROUP, "Type", "Application");
        entry.set(GROUP, "Name", "Video Wallpaper");
        entry.set(GROUP, "Comment", "Play a video as the desktop wallpaper");
        entry.set(GROUP, "Exec", escape_value(&exec.join(" ")));
        entry.set(GROUP, "Terminal", "false");
        entry.set(GROUP, "Hidden", (!enabled).to_string());
        entry.set(GROUP, ENABLED_KEY, enabled.to_string());
        entry.set(GROUP, VIDEO_KEY, escape_value(video_arg));

        entry.save(&self.file)?;
        log::info!(
            "Wrote autostart entry {} (enabled: {}, video: {})",
            self.file.display(),
            enabled,
            video
        );
        Ok(())
    }

    /// Remove the entry; succeeds when there is nothing to remove
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.file) {
            Ok(()) => {
                log::info!("Removed autostart entry {}", self.file.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn read(&self) -> Result<AutostartDeclaration, DeclarationError> {
        let entry = KeyFile::load(&self.file)?;
        parse_declaration(&entry)
    }
}

fn parse_declaration(entry: &KeyFile) -> Result<AutostartDeclaration, DeclarationError> {
    let enabled = match entry.get(GROUP, ENABLED_KEY).map(str::trim_end) {
        Some("true") => true,
        Some("false") => false,
        Some(other) => return Err(DeclarationError::InvalidFlag(other.to_string())),
        None => return Err(DeclarationError::MissingKey(ENABLED_KEY)),
    };

    let video = entry
        .get(GROUP, VIDEO_KEY)
        .filter(|v| !v.is_empty())
        .ok_or(DeclarationError::MissingKey(VIDEO_KEY))?;

    Ok(AutostartDeclaration {
        enabled,
        video: PathBuf::from(unescape_value(video)),
    })
}

/// Quote one `Exec` argument (desktop entry quoting rules)
fn quote_exec_arg(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        match c {
            '"' | '`' | '$' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '%' => out.push_str("%%"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn utf8_path(path: &Path) -> io::Result<&str> {
    path.to_str().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is not valid UTF-8: {}", path.display()),
        )
    })
}

/// Escape a desktop entry value; edge spaces become `\s` so readers that
/// trim values keep them
fn escape_value(value: &str) -> String {
    let body_start = value.len() - value.trim_start_matches(' ').len();
    let body_end = value.trim_end_matches(' ').len();

    let mut out = String::with_capacity(value.len());
    for (i, c) in value.char_indices() {
        match c {
            ' ' if i < body_start || i >= body_end => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('s') => out.push(' '),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
