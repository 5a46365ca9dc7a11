use serde::Serialize;
use time::OffsetDateTime;

use super::duration::humanize;
use crate::model::Task;
use crate::timestamp::delta_millis;

/// Due-date summary of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueData {
    /// Whether the task counts as completed.
    pub completed: bool,
    /// Completion timestamp, if recorded.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_date: Option<OffsetDateTime>,
    /// Due timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    /// Not completed and past due.
    pub overdue: bool,
    /// `(completed date or now) - due date`, in milliseconds.
    pub delta_ms: i64,
    /// Human-readable summary such as `2 days overdue`.
    pub message: String,
}

/// Due summary for `task`, or `None` when it has no due date.
///
/// A completed task without a recorded completion date is measured against
/// `now`.
#[must_use]
pub fn due_data(task: &Task, completed: bool, now: OffsetDateTime) -> Option<DueData> {
    let due_date = task.metadata.due?;
    let completed_date = task.metadata.completed;
    let reference = if completed {
        completed_date.unwrap_or(now)
    } else {
        now
    };
    let delta_ms = delta_millis(reference, due_date);

    let mut message = String::new();
    if completed {
        message.push_str("Completed ");
    }
    message.push_str(&humanize(delta_ms));
    message.push_str(if delta_ms > 0 { " overdue" } else { " remaining" });

    Some(DueData {
        completed,
        completed_date,
        due_date,
        overdue: !completed && delta_ms > 0,
        delta_ms,
        message,
    })
}
