use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use plaintrack_core::IndexOptions;
use serde::Deserialize;
use serde_yaml::Value;

const CONFIG_DIR: &str = ".plaintrack";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_INDEX_FILE: &str = "index.md";
const DEFAULT_TASKS_DIR: &str = "tasks";

/// Project configuration loaded from `.plaintrack/config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Index file, relative to the project root.
    pub index_file: String,
    /// Task directory, relative to the project root.
    pub tasks_dir: String,
    /// Index option overrides. When present they take precedence over the
    /// options stored in the index, and the index is saved without options.
    pub options: Option<toml::Table>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            index_file: DEFAULT_INDEX_FILE.to_owned(),
            tasks_dir: DEFAULT_TASKS_DIR.to_owned(),
            options: None,
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a project root. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = workdir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.index_file.trim().is_empty() {
            bail!("index_file must not be empty");
        }
        if self.tasks_dir.trim().is_empty() {
            bail!("tasks_dir must not be empty");
        }
        Ok(())
    }

    /// Absolute index path under `root`.
    #[must_use]
    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.index_file)
    }

    /// Absolute task directory under `root`.
    #[must_use]
    pub fn tasks_path(&self, root: &Path) -> PathBuf {
        root.join(&self.tasks_dir)
    }

    /// True when this file supplies index options.
    #[must_use]
    pub fn owns_options(&self) -> bool {
        self.options.as_ref().is_some_and(|table| !table.is_empty())
    }

    /// Overlay the configured options onto `options`, key by key.
    ///
    /// # Errors
    /// Returns an error if the merged mapping is not a valid option set.
    pub fn apply_options(&self, options: &mut IndexOptions) -> Result<()> {
        let Some(overrides) = self.options.as_ref().filter(|table| !table.is_empty()) else {
            return Ok(());
        };

        let Value::Mapping(mut merged) =
            serde_yaml::to_value(&*options).context("failed to convert index options")?
        else {
            bail!("index options did not serialize to a mapping");
        };
        let Value::Mapping(overrides) =
            serde_yaml::to_value(overrides).context("failed to convert configured options")?
        else {
            bail!("configured options are not a table");
        };
        for (key, value) in overrides {
            merged.insert(key, value);
        }

        *options = serde_yaml::from_value(Value::Mapping(merged))
            .context("configured options are not valid index options")?;
        Ok(())
    }
}
