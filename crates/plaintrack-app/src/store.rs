//! Persistence of index and task text.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ProjectConfig;

const TASK_EXTENSION: &str = "md";

/// Raw text storage for one project.
///
/// Implementations move strings in and out; decoding and encoding stay with
/// [`crate::ProjectService`].
pub trait ProjectStore {
    /// Error type surfaced by the store.
    type Error: Into<anyhow::Error>;

    /// Read the index text.
    ///
    /// # Errors
    /// Returns an error if the index cannot be read.
    fn read_index(&self) -> Result<String, Self::Error>;

    /// Replace the index text.
    ///
    /// # Errors
    /// Returns an error if the index cannot be written.
    fn write_index(&self, text: &str) -> Result<(), Self::Error>;

    /// Read the text of task `id`.
    ///
    /// # Errors
    /// Returns an error if the task file is missing or unreadable.
    fn read_task(&self, id: &str) -> Result<String, Self::Error>;

    /// Create or replace task `id`.
    ///
    /// # Errors
    /// Returns an error if the task file cannot be written.
    fn write_task(&self, id: &str, text: &str) -> Result<(), Self::Error>;

    /// Delete task `id`. Deleting a missing task is not an error.
    ///
    /// # Errors
    /// Returns an error if the task file exists but cannot be removed.
    fn remove_task(&self, id: &str) -> Result<(), Self::Error>;

    /// Identifiers of every stored task, sorted.
    ///
    /// # Errors
    /// Returns an error if the task directory cannot be listed.
    fn list_tasks(&self) -> Result<Vec<String>, Self::Error>;

    /// True when task `id` is stored.
    ///
    /// # Errors
    /// Returns an error if the task directory cannot be listed.
    fn task_exists(&self, id: &str) -> Result<bool, Self::Error> {
        Ok(self.list_tasks()?.iter().any(|stored| stored == id))
    }
}

/// Project stored as Markdown files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    index_path: PathBuf,
    tasks_path: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`, laid out according to `config`.
    pub fn new(root: impl AsRef<Path>, config: &ProjectConfig) -> Self {
        let root = root.as_ref();
        Self {
            index_path: config.index_path(root),
            tasks_path: config.tasks_path(root),
        }
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Path of the file holding task `id`.
    #[must_use]
    pub fn task_path(&self, id: &str) -> PathBuf {
        self.tasks_path.join(format!("{id}.{TASK_EXTENSION}"))
    }
}

impl ProjectStore for FileStore {
    type Error = anyhow::Error;

    fn read_index(&self) -> Result<String> {
        debug!(path = %self.index_path.display(), "Reading index");
        fs::read_to_string(&self.index_path)
            .with_context(|| format!("failed to read {}", self.index_path.display()))
    }

    fn write_index(&self, text: &str) -> Result<()> {
        fs::write(&self.index_path, text)
            .with_context(|| format!("failed to write {}", self.index_path.display()))?;
        info!(path = %self.index_path.display(), "Saved index");
        Ok(())
    }

    fn read_task(&self, id: &str) -> Result<String> {
        let path = self.task_path(id);
        debug!(%id, path = %path.display(), "Reading task");
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    fn write_task(&self, id: &str, text: &str) -> Result<()> {
        fs::create_dir_all(&self.tasks_path)
            .with_context(|| format!("failed to create {}", self.tasks_path.display()))?;
        let path = self.task_path(id);
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!(%id, path = %path.display(), "Saved task");
        Ok(())
    }

    fn remove_task(&self, id: &str) -> Result<()> {
        let path = self.task_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(%id, path = %path.display(), "Removed task");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    fn list_tasks(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.tasks_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to list {}", self.tasks_path.display()));
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to list {}", self.tasks_path.display()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TASK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn task_exists(&self, id: &str) -> Result<bool> {
        Ok(self.task_path(id).is_file())
    }
}
