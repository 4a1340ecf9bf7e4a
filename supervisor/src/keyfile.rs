//! Minimal `[group]` / `key=value` text files.
//!
//! Both the desktop autostart entry and the legacy settings file use this
//! shape. Parsing is lenient: comments, blank lines and lines without `=`
//! are skipped, so a hand-edited file never fails to load.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Group {
    name: String,
    entries: Vec<(String, String)>,
}

/// Ordered key file; rendering preserves group and key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    groups: Vec<Group>,
}

impl KeyFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut file = Self::new();
        let mut current: Option<usize> = None;

        for line in text.lines() {
            // Trailing whitespace belongs to the value
            let line = line.trim_start();
            let trimmed = line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(file.group_index(name.trim()));
                continue;
            }

            // Keys before any group header have no home
            let (Some(idx), Some((key, value))) = (current, line.split_once('=')) else {
                continue;
            };

            let group = &mut file.groups[idx];
            let key = key.trim();
            // Later duplicates win
            group.entries.retain(|(k, _)| k != key);
            group
                .entries
                .push((key.to_string(), value.trim_start().to_string()));
        }

        file
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == group)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, group: &str, key: &str, value: impl Into<String>) {
        let idx = self.group_index(group);
        let value = value.into();
        let entries = &mut self.groups[idx].entries;

        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", group.name));
            for (key, value) in &group.entries {
                out.push_str(&format!("{}={}\n", key, value));
            }
        }
        out
    }

    /// Write the rendered file atomically
    pub fn save(&self, path: &Path) -> io::Result<()> {
        write_atomic(path, self.render().as_bytes())
    }

    fn group_index(&mut self, name: &str) -> usize {
        match self.groups.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                self.groups.push(Group {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.groups.len() - 1
            }
        }
    }
}

/// Write `contents` to a temp file next to `path`, then rename over it.
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    log::debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}
