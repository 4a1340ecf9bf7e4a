use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::playback::{LaunchCommand, ProcessSignature};
use crate::validate_enum;
use common::APP_NAME;

/// Directory roots resolved once at startup and passed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    /// Per-user configuration root, usually `~/.config`
    pub config_dir: PathBuf,
    /// Directory holding the program and its bundled helpers
    pub program_dir: PathBuf,
}

impl AppDirs {
    pub fn new(config_dir: impl Into<PathBuf>, program_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            program_dir: program_dir.into(),
        }
    }

    /// Resolve from the user's environment and the running executable
    pub fn discover() -> Result<Self> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        let exe = std::env::current_exe().context("Failed to locate running executable")?;
        let program_dir = exe
            .parent()
            .context("Executable has no parent directory")?
            .to_path_buf();

        Ok(Self::new(config_dir, program_dir))
    }

    /// `~/.config/video-wallpaper`
    pub fn app_config_dir(&self) -> PathBuf {
        self.config_dir.join(APP_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.app_config_dir().join("config.toml")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.app_config_dir().join("settings.conf")
    }

    /// Directory scanned by the desktop session for login items
    pub fn autostart_dir(&self) -> PathBuf {
        self.config_dir.join("autostart")
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub launcher: LauncherSettings,

    #[serde(default)]
    pub dependencies: DependencySettings,

    #[serde(default)]
    pub process: ProcessSettings,

    #[serde(default)]
    pub autostart: AutostartSettings,
}

/// General settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// External launcher script
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LauncherSettings {
    /// Launcher program; defaults to `video-wallpaper.sh` next to the executable
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments placed before the launcher's own flags
    #[serde(default)]
    pub args: Vec<String>,
}

/// Tools that must be present before playback can be controlled
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencySettings {
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,

    /// Window-embedding helper; defaults to `xwinwrap` next to the executable
    #[serde(default)]
    pub helper: Option<String>,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            helper: None,
        }
    }
}

fn default_tools() -> Vec<String> {
    vec!["mpv".to_string(), "pcregrep".to_string(), "xrandr".to_string()]
}

/// How a live rendering process is recognised
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessSettings {
    #[serde(default = "default_process_names")]
    pub names: Vec<String>,

    /// PID file maintained by the launcher, if it writes one
    #[serde(default)]
    pub pid_file: Option<String>,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            names: default_process_names(),
            pid_file: None,
        }
    }
}

fn default_process_names() -> Vec<String> {
    vec![HELPER_NAME.to_string()]
}

/// Autostart declaration location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutostartSettings {
    /// Overrides `<config_dir>/autostart`
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_autostart_file_name")]
    pub file_name: String,
}

impl Default for AutostartSettings {
    fn default() -> Self {
        Self {
            dir: None,
            file_name: default_autostart_file_name(),
        }
    }
}

fn default_autostart_file_name() -> String {
    format!("{}.desktop", APP_NAME)
}

const HELPER_NAME: &str = "xwinwrap";
const LAUNCHER_NAME: &str = "video-wallpaper.sh";

impl Config {
    /// Load configuration from the default location
    pub fn load(dirs: &AppDirs) -> Result<Self> {
        Self::load_from_path(&dirs.config_file())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        if let Some(program) = &self.launcher.program {
            if program.trim().is_empty() {
                anyhow::bail!("launcher.program must not be empty");
            }
        }

        if let Some(tool) = self.dependencies.tools.iter().find(|t| t.trim().is_empty()) {
            anyhow::bail!("Invalid dependency name: {:?}", tool);
        }

        if self.process.names.iter().any(|n| n.trim().is_empty()) {
            anyhow::bail!("process.names must not contain empty names");
        }

        let file_name = &self.autostart.file_name;
        if file_name.contains('/') || !file_name.ends_with(".desktop") {
            anyhow::bail!(
                "Invalid autostart file name: {} (expected <name>.desktop)",
                file_name
            );
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }

    /// Launcher invocation prefix
    pub fn launch_command(&self, dirs: &AppDirs) -> Result<LaunchCommand> {
        let program = match &self.launcher.program {
            Some(program) => expand_path(program)?,
            None => dirs.program_dir.join(LAUNCHER_NAME),
        };

        Ok(LaunchCommand::new(program).with_args(self.launcher.args.clone()))
    }

    /// Expected location of the window-embedding helper
    pub fn helper_path(&self, dirs: &AppDirs) -> Result<PathBuf> {
        match &self.dependencies.helper {
            Some(helper) => expand_path(helper),
            None => Ok(dirs.program_dir.join(HELPER_NAME)),
        }
    }

    pub fn autostart_file(&self, dirs: &AppDirs) -> Result<PathBuf> {
        let dir = match &self.autostart.dir {
            Some(dir) => expand_path(dir)?,
            None => dirs.autostart_dir(),
        };

        Ok(dir.join(&self.autostart.file_name))
    }

    pub fn process_signature(&self) -> Result<ProcessSignature> {
        let pid_file = self
            .process
            .pid_file
            .as_deref()
            .map(expand_path)
            .transpose()?;

        Ok(ProcessSignature::new(self.process.names.clone()).with_pid_file(pid_file))
    }
}

/// Expand `~` and `$VARS` in a configured path
fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(raw).with_context(|| format!("Failed to expand path: {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
