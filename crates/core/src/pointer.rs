//! Remembered preferences path stored between runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Single-line record holding the last explicitly selected `prefs.xml`.
#[derive(Debug, Clone)]
pub struct FallbackPointer {
    path: PathBuf,
}

impl FallbackPointer {
    /// Pointer stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the pointer record itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remembered path, returning `None` if no record exists or it is blank.
    pub fn load(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read pointer {}", self.path.display()))?;
        let line = contents.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(line)))
    }

    /// Overwrite the record with `target`, creating parent directories if needed.
    ///
    /// Paths that are not valid UTF-8 or span several lines cannot be
    /// recorded faithfully and are rejected.
    pub fn persist(&self, target: &Path) -> Result<()> {
        let line = target
            .to_str()
            .filter(|line| !line.contains(['\n', '\r']))
            .with_context(|| format!("cannot record path {} in pointer", target.display()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create pointer directory {}", parent.display())
            })?;
        }

        fs::write(&self.path, format!("{line}\n"))
            .with_context(|| format!("failed to write pointer {}", self.path.display()))
    }
}
