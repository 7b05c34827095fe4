//! Staging area for fetched files.
//!
//! Every ingestion request works against a single directory that is
//! emptied before fetching begins and again once the batch completes,
//! whether it succeeded or failed. Nothing in here survives a request.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::StagedFile;

/// Replace path separators and parent references so a remote item name
/// can never escape the staging directory.
pub fn sanitize_file_name(name: &str) -> String {
    name.replace(['/', '\\'], "_").replace("..", "_")
}

pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every entry under the staging root, creating the root if
    /// it does not exist yet. Files and subdirectories alike.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            for entry in std::fs::read_dir(&self.root)
                .with_context(|| format!("Failed to read staging dir {}", self.root.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    std::fs::remove_dir_all(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                } else {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
            }
        } else {
            std::fs::create_dir_all(&self.root)
                .with_context(|| format!("Failed to create staging dir {}", self.root.display()))?;
        }
        Ok(())
    }

    /// Write `bytes` under the staging root and return the staged entry.
    ///
    /// `parent_dir` is a display label only; files are laid out flat, so
    /// two folder items with the same name will collide and the later
    /// write wins, matching how duplicate names behave in the index.
    pub fn write(&self, name: &str, parent_dir: &str, bytes: &[u8]) -> Result<StagedFile> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create staging dir {}", self.root.display()))?;

        let name = sanitize_file_name(name);
        let path = self.root.join(&name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write staged file {}", path.display()))?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(StagedFile {
            path,
            name,
            extension,
            parent_dir: parent_dir.to_string(),
        })
    }

    /// List the files currently staged, in directory order.
    pub fn list(&self) -> Result<Vec<StagedFile>> {
        let mut files = Vec::new();
        if !self.root.exists() {
            return Ok(files);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            files.push(StagedFile {
                path,
                name,
                extension,
                parent_dir: String::new(),
            });
        }
        Ok(files)
    }
}
