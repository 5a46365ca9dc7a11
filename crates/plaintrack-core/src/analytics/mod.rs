//! Workload, progress, due dates, column-linked dates, status and burndown.
//!
//! Every function is pure: the caller supplies `now` and the task records.

mod burndown;
mod due;
mod duration;
mod linked;
mod metrics;
mod status;
mod window;

use std::collections::HashMap;

pub use burndown::{
    BurndownEvent, BurndownOptions, BurndownPoint, BurndownSeries, EventKind, Normalise,
    Resolution, burndown,
};
pub use due::{DueData, due_data};
pub use duration::humanize;
pub use linked::{LinkedField, linked_fields, update_column_linked_fields};
pub use metrics::{is_completed, is_started, progress, remaining_workload, workload};
pub use status::{
    AssigneeStatus, ColumnStatus, DueTask, PeriodStatus, SprintStatus, StatusOptions,
    StatusReport, TaskStatus, WindowStats, status,
};
pub use window::{SelectedSprint, SprintSelector, Window, select_sprint};

use crate::model::{Index, Task};

/// Failures raised by sprint and range selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyticsError {
    /// No sprint matches the selector.
    #[error("sprint `{0}` not found")]
    SprintNotFound(String),
    /// A sprint was requested but none are configured.
    #[error("no sprints are defined")]
    NoSprints,
    /// The requested window is empty or reversed.
    #[error("invalid date range: {0}")]
    InvalidRange(String),
}

/// Result alias for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// A task listed in the index, with the column that holds it.
#[derive(Debug, Clone, Copy)]
struct Tracked<'t> {
    task: &'t Task,
    column: usize,
    column_name: &'t str,
}

/// Tasks present in the index, in column order. Records not listed in any
/// column are left out.
fn tracked<'t>(index: &'t Index, tasks: &'t [Task]) -> Vec<Tracked<'t>> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|task| (task.id.as_str(), task)).collect();
    let mut out = Vec::with_capacity(tasks.len());
    for (column, entry) in index.columns.iter().enumerate() {
        for id in &entry.tasks {
            if let Some(&task) = by_id.get(id.as_str()) {
                out.push(Tracked {
                    task,
                    column,
                    column_name: entry.name.as_str(),
                });
            }
        }
    }
    out
}
