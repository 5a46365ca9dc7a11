use std::collections::HashSet;

use anyhow::Result;
use plaintrack_core::{Task, TaskCodec, sort_tasks};
use serde::Serialize;
use tracing::{info, warn};

use crate::service::{ProjectService, store_error};
use crate::store::ProjectStore;

/// One problem found by [`ProjectService::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Task the problem belongs to; `None` for index-level problems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn for_task(id: &str, message: impl Into<String>) -> Self {
        Self {
            task: Some(id.to_owned()),
            message: message.into(),
        }
    }

    fn for_index(message: impl Into<String>) -> Self {
        Self {
            task: None,
            message: message.into(),
        }
    }
}

impl<S: ProjectStore> ProjectService<S> {
    /// Check the whole project without modifying it.
    ///
    /// The index must decode; after that every listed task is checked on its
    /// own and each failure becomes one [`ValidationIssue`]. An empty result
    /// means the project is valid.
    ///
    /// # Errors
    /// Returns an error only if the index itself cannot be loaded.
    pub fn validate(&self) -> Result<Vec<ValidationIssue>> {
        let index = self.load_index()?;
        let codec = TaskCodec::new(&index.options.custom_fields);
        let mut issues = Vec::new();

        for (column, sorters) in &index.options.column_sorting {
            if index.column(column).is_none() {
                issues.push(ValidationIssue::for_index(format!(
                    "saved sorting refers to missing column `{column}`"
                )));
            }
            if let Err(err) = sort_tasks(&index, std::iter::empty::<&Task>(), sorters) {
                issues.push(ValidationIssue::for_index(format!("sorting of column `{column}`: {err}")));
            }
        }

        let mut seen = HashSet::new();
        for id in index.task_ids() {
            if !seen.insert(id) {
                issues.push(ValidationIssue::for_task(id, "listed more than once in the index"));
                continue;
            }
            let text = match self.store().read_task(id).map_err(store_error) {
                Ok(text) => text,
                Err(err) => {
                    issues.push(ValidationIssue::for_task(id, format!("{err:#}")));
                    continue;
                }
            };
            match codec.decode(&text) {
                Ok(task) if task.id != id => issues.push(ValidationIssue::for_task(
                    id,
                    format!("name `{}` derives id `{}`", task.name, task.id),
                )),
                Ok(_) => {}
                Err(err) => issues.push(ValidationIssue::for_task(id, err.to_string())),
            }
        }

        for issue in &issues {
            warn!(task = issue.task.as_deref().unwrap_or("<index>"), message = %issue.message, "Validation failed");
        }
        info!(tasks = seen.len(), issues = issues.len(), "Validated project");
        Ok(issues)
    }
}
