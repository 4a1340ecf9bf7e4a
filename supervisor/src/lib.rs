//! Lifecycle supervisor for video wallpapers.
//!
//! The wallpaper itself is played by an external launcher script that
//! embeds a media player into the desktop background. This crate decides
//! when that launcher runs, checks that its tools are installed, and keeps
//! the login autostart entry in step with the selected video.
//!
//! Components, leaf first:
//!
//! - [`DependencyChecker`] finds missing executables.
//! - [`AutostartStore`] owns the desktop autostart entry.
//! - [`PlaybackController`] starts and stops playback through the launcher.
//! - [`WallpaperManager`] turns user intents into calls on the three above.
//!
//! # Examples
//!
//! ```no_run
//! use supervisor::{AppDirs, Config, WallpaperManager};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dirs = AppDirs::discover()?;
//! let config = Config::load(&dirs)?;
//! let mut manager = WallpaperManager::from_config(&config, &dirs)?;
//!
//! manager.initialize()?;
//! manager.on_file_selected("/home/me/Videos/waves.mp4")?;
//! println!("{}", manager.on_start()?);
//! # Ok(())
//! # }
//! ```

mod macros;

pub mod autostart;
pub mod config;
pub mod dependency;
pub mod keyfile;
pub mod manager;
pub mod playback;
pub mod settings;

pub use autostart::{AutostartDeclaration, AutostartStore};
pub use config::{AppDirs, Config};
pub use dependency::DependencyChecker;
pub use manager::{ManagerError, Outcome, StatusMessage, WallpaperManager};
pub use playback::{LaunchCommand, LaunchError, PlaybackController, ProcessSignature, StopError};
pub use settings::Settings;
