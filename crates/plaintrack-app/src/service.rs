use anyhow::{Context, Result};
use plaintrack_core::analytics::{
    BurndownOptions, BurndownSeries, StatusOptions, StatusReport, burndown, status,
    update_column_linked_fields,
};
use plaintrack_core::{
    Index, Sorter, Task, TaskCodec, TaskFilter, checked_task_id, decode_index, encode_index,
    encode_task, filter_tasks, sort_tasks,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::store::ProjectStore;

/// Semantic failures of project operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectError {
    /// No column lists the task.
    #[error("no task with id `{0}` in the index")]
    TaskNotFound(String),
    /// The target column does not exist.
    #[error("column `{0}` does not exist")]
    ColumnNotFound(String),
    /// Another task already uses the identifier.
    #[error("a task with id `{0}` already exists")]
    DuplicateTask(String),
    /// The name is blank or derives no identifier.
    #[error("task name {0:?} has no letters or digits to derive an id from")]
    InvalidName(String),
}

/// A decoded index with every task it lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Index with configured options applied.
    pub index: Index,
    /// Tasks in index order.
    pub tasks: Vec<Task>,
}

impl Project {
    /// Look up a loaded task.
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }
}

/// Service façade that owns every load, mutate and persist cycle.
pub struct ProjectService<S> {
    store: S,
    config: ProjectConfig,
}

impl<S> ProjectService<S> {
    /// Wrap `store`, reading paths and option overrides from `config`.
    pub const fn new(store: S, config: ProjectConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }
}

pub(crate) fn store_error<E: Into<anyhow::Error>>(err: E) -> anyhow::Error {
    err.into()
}

impl<S: ProjectStore> ProjectService<S> {
    /// Decode the index and overlay configured options.
    ///
    /// # Errors
    /// Returns an error if the index cannot be read or decoded, or if the
    /// configured options do not merge.
    pub fn load_index(&self) -> Result<Index> {
        let text = self.store.read_index().map_err(store_error)?;
        let mut index = decode_index(&text).context("failed to decode index")?;
        self.config.apply_options(&mut index.options)?;
        Ok(index)
    }

    /// Decode task `id` using the custom fields declared in `index`.
    ///
    /// The file name is authoritative: a task whose name derives a different
    /// identifier keeps the one it is stored under.
    ///
    /// # Errors
    /// Returns an error if the task cannot be read or decoded.
    pub fn load_task(&self, index: &Index, id: &str) -> Result<Task> {
        let text = self.store.read_task(id).map_err(store_error)?;
        let mut task = TaskCodec::new(&index.options.custom_fields)
            .decode(&text)
            .with_context(|| format!("failed to decode task {id}"))?;
        if task.id != id {
            debug!(file = %id, derived = %task.id, "Task name does not match its file");
            id.clone_into(&mut task.id);
        }
        Ok(task)
    }

    /// Load the index and every task it lists.
    ///
    /// # Errors
    /// Returns an error if the index or any listed task fails to load.
    pub fn load(&self) -> Result<Project> {
        let index = self.load_index()?;
        let tasks = index
            .task_ids()
            .map(|id| self.load_task(&index, id))
            .collect::<Result<Vec<_>>>()?;
        debug!(tasks = tasks.len(), columns = index.columns.len(), "Loaded project");
        Ok(Project { index, tasks })
    }

    /// Persist `index`, re-applying any saved column sorting first.
    ///
    /// Options are left out of the file when the configuration owns them.
    ///
    /// # Errors
    /// Returns an error if a saved sorter is invalid or the write fails.
    pub fn save_index(&self, index: &mut Index, tasks: &[Task]) -> Result<()> {
        let saved: Vec<(String, Vec<Sorter>)> = index
            .options
            .column_sorting
            .iter()
            .map(|(column, sorters)| (column.clone(), sorters.clone()))
            .collect();
        for (column, sorters) in saved {
            if index.column(&column).is_none() {
                warn!(%column, "Saved sorting refers to a missing column");
                continue;
            }
            index
                .sort_column(&column, tasks, &sorters, false)
                .with_context(|| format!("failed to re-apply sorting of column {column}"))?;
            debug!(%column, sorters = sorters.len(), "Re-applied saved sorting");
        }

        let text = encode_index(index, self.config.owns_options()).context("failed to encode index")?;
        self.store.write_index(&text).map_err(store_error)
    }

    /// Persist one task under its identifier.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub fn save_task(&self, task: &Task) -> Result<()> {
        let text = encode_task(task).with_context(|| format!("failed to encode task {}", task.id))?;
        self.store.write_task(&task.id, &text).map_err(store_error)
    }

    /// Move a task into `column`, appending unless `position` is given.
    ///
    /// Column-linked date fields are updated and `updated` is set to `now`.
    ///
    /// # Errors
    /// Returns [`ProjectError::TaskNotFound`] or [`ProjectError::ColumnNotFound`],
    /// or an error if loading or saving fails.
    pub fn move_task(
        &self,
        id: &str,
        column: &str,
        position: Option<usize>,
        now: OffsetDateTime,
    ) -> Result<Task> {
        let mut project = self.load()?;
        if project.index.column(column).is_none() {
            return Err(ProjectError::ColumnNotFound(column.to_owned()).into());
        }
        let settings = project.index.options.clone();
        let task = project
            .task_mut(id)
            .ok_or_else(|| ProjectError::TaskNotFound(id.to_owned()))?;

        let touched = update_column_linked_fields(task, &settings, column, now);
        task.metadata.updated = Some(now);
        let moved = task.clone();
        self.save_task(&moved)?;

        project.index.add_task_to_column(id, column, position);
        self.save_index(&mut project.index, &project.tasks)?;
        info!(%id, %column, fields = ?touched, "Moved task");
        Ok(moved)
    }

    /// Rename a task, re-deriving its identifier.
    ///
    /// The task file, the index entry and relations in other tasks follow the
    /// new identifier.
    ///
    /// # Errors
    /// Returns [`ProjectError::TaskNotFound`], [`ProjectError::InvalidName`] or
    /// [`ProjectError::DuplicateTask`] before anything is written, or an error
    /// if loading or saving fails.
    pub fn rename_task(&self, id: &str, name: &str, now: OffsetDateTime) -> Result<Task> {
        let mut project = self.load()?;
        if project.task(id).is_none() {
            return Err(ProjectError::TaskNotFound(id.to_owned()).into());
        }
        let new_id = checked_task_id(name).map_err(|err| ProjectError::InvalidName(err.0))?;
        if new_id != id
            && (project.index.contains_task(&new_id)
                || self.store.task_exists(&new_id).map_err(store_error)?)
        {
            return Err(ProjectError::DuplicateTask(new_id).into());
        }

        let mut relinked = Vec::new();
        for task in &mut project.tasks {
            if task.id == id {
                task.rename(name).map_err(|err| ProjectError::InvalidName(err.0))?;
                task.metadata.updated = Some(now);
                continue;
            }
            let mut changed = false;
            for relation in task.relations.iter_mut().filter(|relation| relation.task == id) {
                new_id.clone_into(&mut relation.task);
                changed = true;
            }
            if changed {
                relinked.push(task.id.clone());
            }
        }

        let Some(renamed) = project.task(&new_id).cloned() else {
            return Err(ProjectError::TaskNotFound(new_id).into());
        };
        self.save_task(&renamed)?;
        if new_id != id {
            self.store.remove_task(id).map_err(store_error)?;
        }
        for other in &relinked {
            if let Some(task) = project.task(other) {
                self.save_task(task)?;
            }
        }

        project.index.rename_task_everywhere(id, &new_id);
        self.save_index(&mut project.index, &project.tasks)?;
        info!(from = %id, to = %new_id, relinked = relinked.len(), "Renamed task");
        Ok(renamed)
    }

    /// Reorder `column` by `sorters` and persist the index.
    ///
    /// With `save` the sorters are stored and re-applied on every later save;
    /// an empty list with `save` clears them. Returns the new column order.
    ///
    /// # Errors
    /// Returns an error for an unknown column or sort field, an invalid
    /// extraction pattern, or a failed load or save.
    pub fn sort_column(&self, column: &str, sorters: &[Sorter], save: bool) -> Result<Vec<String>> {
        let Project { mut index, tasks } = self.load()?;
        if index.column(column).is_none() {
            return Err(ProjectError::ColumnNotFound(column.to_owned()).into());
        }
        if save && self.config.owns_options() {
            warn!(%column, "Options come from the config file; saved sorting will not persist");
        }
        index
            .sort_column(column, &tasks, sorters, save)
            .with_context(|| format!("failed to sort column {column}"))?;
        self.save_index(&mut index, &tasks)?;

        let order = index
            .column(column)
            .map(|target| target.tasks.clone())
            .unwrap_or_default();
        info!(%column, saved = save, tasks = order.len(), "Sorted column");
        Ok(order)
    }

    /// Tasks matching `filter`, ordered by `sorters` (index order when empty).
    ///
    /// # Errors
    /// Returns an error for unknown fields, mistyped filter values, invalid
    /// patterns, or a failed load.
    pub fn find(&self, filter: &TaskFilter, sorters: &[Sorter]) -> Result<Vec<Task>> {
        let Project { index, tasks } = self.load()?;
        let matched = filter_tasks(&index, tasks, filter)?;
        let sorted = sort_tasks(&index, matched, sorters)?;
        debug!(matched = sorted.len(), "Found tasks");
        Ok(sorted)
    }

    /// Aggregate project status at `now`.
    ///
    /// # Errors
    /// Returns an error for an unknown sprint, an empty date range, or a
    /// failed load.
    pub fn status(&self, options: &StatusOptions, now: OffsetDateTime) -> Result<StatusReport> {
        let Project { index, tasks } = self.load()?;
        Ok(status(&index, &tasks, options, now)?)
    }

    /// Burndown series at `now`.
    ///
    /// # Errors
    /// Returns an error for an unknown or future sprint, an empty date range,
    /// or a failed load.
    pub fn burndown(&self, options: &BurndownOptions, now: OffsetDateTime) -> Result<Vec<BurndownSeries>> {
        let Project { index, tasks } = self.load()?;
        Ok(burndown(&index, &tasks, options, now)?)
    }
}
