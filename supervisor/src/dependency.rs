//! Probes for the external tools playback depends on.

use anyhow::Result;
use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::{AppDirs, Config};
use common::MissingTool;

/// Checks that required executables resolve on the search path and that
/// the window-embedding helper sits at its fixed location.
#[derive(Debug, Clone)]
pub struct DependencyChecker {
    tools: Vec<String>,
    helper: PathBuf,
    search_path: Vec<PathBuf>,
}

impl DependencyChecker {
    /// Create a checker that resolves tools through `PATH`
    pub fn new(tools: Vec<String>, helper: impl Into<PathBuf>) -> Self {
        let path = std::env::var_os("PATH").unwrap_or_else(OsString::new);
        Self::with_search_path(tools, helper, std::env::split_paths(&path).collect())
    }

    pub fn with_search_path(
        tools: Vec<String>,
        helper: impl Into<PathBuf>,
        search_path: Vec<PathBuf>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(tools.len());
        for tool in tools {
            if !unique.contains(&tool) {
                unique.push(tool);
            }
        }

        Self {
            tools: unique,
            helper: helper.into(),
            search_path,
        }
    }

    pub fn from_config(config: &Config, dirs: &AppDirs) -> Result<Self> {
        Ok(Self::new(
            config.dependencies.tools.clone(),
            config.helper_path(dirs)?,
        ))
    }

    /// Return every unmet requirement; empty means all satisfied.
    ///
    /// Never fails: a tool that cannot be found is reported, not raised.
    pub fn check(&self) -> Vec<MissingTool> {
        log::info!("Checking for missing dependencies");
        let mut missing = Vec::new();

        for tool in &self.tools {
            match self.resolve(tool) {
                Some(found) => log::debug!("  {} -> {}", tool, found.display()),
                None => {
                    log::debug!("  {} not found on search path", tool);
                    missing.push(MissingTool::on_search_path(tool.as_str()));
                }
            }
        }

        if self.helper.is_file() {
            log::debug!("  helper -> {}", self.helper.display());
        } else {
            log::debug!("  helper missing at {}", self.helper.display());
            missing.push(MissingTool::at(helper_name(&self.helper), &self.helper));
        }

        if missing.is_empty() {
            log::info!("All dependencies fulfilled");
        } else {
            log::warn!(
                "Missing dependencies: {}",
                common::format_missing(&missing)
            );
        }

        missing
    }

    /// Locate `tool` the way a shell would
    fn resolve(&self, tool: &str) -> Option<PathBuf> {
        if tool.contains('/') {
            let path = PathBuf::from(tool);
            return is_executable(&path).then_some(path);
        }

        self.search_path
            .iter()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(tool))
            .find(|candidate| is_executable(candidate))
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn helper_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
