use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use super::due::{DueData, due_data};
use super::duration::humanize;
use super::metrics::{is_completed, is_started, progress, remaining_workload, workload};
use super::window::{SprintSelector, Window, select_sprint};
use super::{AnalyticsResult, Tracked, tracked};
use crate::model::{CustomFieldType, Index, IndexOptions, Task};

const WINDOW_FIELDS: [&str; 4] = ["created", "started", "completed", "due"];

/// Optional sections of a status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOptions {
    /// Include the due-date list.
    pub due: bool,
    /// Include statistics for this sprint.
    pub sprint: Option<SprintSelector>,
    /// Include statistics for the day range spanned by these dates.
    pub dates: Vec<OffsetDateTime>,
}

/// Aggregated project status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Project name.
    pub name: String,
    /// Number of tracked tasks.
    pub tasks: usize,
    /// Tasks with a started date or in a started column.
    pub started_tasks: usize,
    /// Tasks with a completed date or in a completed column.
    pub completed_tasks: usize,
    /// Sum of all task workloads.
    pub total_workload: u32,
    /// Sum of all remaining workloads.
    pub total_remaining_workload: u32,
    /// Per-column totals, in column order.
    pub columns: Vec<ColumnStatus>,
    /// Per-task figures, in column order.
    pub task_workloads: Vec<TaskStatus>,
    /// Per-assignee totals.
    pub assigned: BTreeMap<String, AssigneeStatus>,
    /// Tasks with a due date, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Vec<DueTask>>,
    /// Sprint window statistics, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<SprintStatus>,
    /// Explicit period statistics, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodStatus>,
}

/// Totals for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatus {
    /// Column name.
    pub name: String,
    /// Number of tasks.
    pub tasks: usize,
    /// Summed workload.
    pub workload: u32,
    /// Summed remaining workload.
    pub remaining_workload: u32,
}

/// Figures for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Task id.
    pub id: String,
    /// Column holding the task.
    pub column: String,
    /// Workload.
    pub workload: u32,
    /// Progress fraction.
    pub progress: f64,
    /// Remaining workload.
    pub remaining_workload: u32,
    /// Completion flag.
    pub completed: bool,
}

/// Totals for one assignee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeStatus {
    /// Number of assigned tasks.
    pub tasks: usize,
    /// Summed workload.
    pub workload: u32,
    /// Summed remaining workload.
    pub remaining_workload: u32,
}

/// A task with a due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueTask {
    /// Task id.
    pub id: String,
    /// Task name.
    pub name: String,
    /// Column holding the task.
    pub column: String,
    /// Due summary.
    #[serde(flatten)]
    pub due: DueData,
}

/// Tasks whose date field falls inside a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    /// Matching task ids.
    pub tasks: Vec<String>,
    /// Summed workload of the matching tasks.
    pub workload: u32,
}

/// Statistics for one sprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintStatus {
    /// 1-based sprint number.
    pub number: usize,
    /// Sprint name.
    pub name: String,
    /// Sprint description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Sprint window.
    #[serde(flatten)]
    pub window: Window,
    /// Window length in milliseconds.
    pub duration_ms: i64,
    /// Window length in words.
    pub duration_message: String,
    /// Per date field statistics, including date custom fields.
    pub fields: BTreeMap<String, WindowStats>,
}

/// Statistics for an explicit date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodStatus {
    /// Day-aligned window.
    #[serde(flatten)]
    pub window: Window,
    /// Per date field statistics.
    pub fields: BTreeMap<String, WindowStats>,
}

/// Aggregate `tasks` against the layout and options of `index`.
///
/// Records that are not listed in any column are ignored.
///
/// # Errors
/// Propagates sprint selection and date range errors.
pub fn status(
    index: &Index,
    tasks: &[Task],
    options: &StatusOptions,
    now: OffsetDateTime,
) -> AnalyticsResult<StatusReport> {
    let settings = &index.options;
    let tracked = tracked(index, tasks);

    let mut report = StatusReport {
        name: index.name.clone(),
        tasks: tracked.len(),
        columns: index
            .columns
            .iter()
            .map(|column| ColumnStatus {
                name: column.name.clone(),
                tasks: 0,
                workload: 0,
                remaining_workload: 0,
            })
            .collect(),
        ..StatusReport::default()
    };

    for entry in &tracked {
        let column = Some(entry.column_name);
        let task_workload = workload(entry.task, settings);
        let remaining = remaining_workload(entry.task, settings, column);
        let completed = is_completed(entry.task, settings, column);

        report.total_workload = report.total_workload.saturating_add(task_workload);
        report.total_remaining_workload = report.total_remaining_workload.saturating_add(remaining);
        if completed {
            report.completed_tasks += 1;
        }
        if is_started(entry.task, settings, column) {
            report.started_tasks += 1;
        }
        if let Some(totals) = report.columns.get_mut(entry.column) {
            totals.tasks += 1;
            totals.workload = totals.workload.saturating_add(task_workload);
            totals.remaining_workload = totals.remaining_workload.saturating_add(remaining);
        }
        if let Some(assignee) = &entry.task.metadata.assigned {
            let totals = report.assigned.entry(assignee.clone()).or_default();
            totals.tasks += 1;
            totals.workload = totals.workload.saturating_add(task_workload);
            totals.remaining_workload = totals.remaining_workload.saturating_add(remaining);
        }
        report.task_workloads.push(TaskStatus {
            id: entry.task.id.clone(),
            column: entry.column_name.to_owned(),
            workload: task_workload,
            progress: progress(entry.task, settings, column),
            remaining_workload: remaining,
            completed,
        });
    }

    if options.due {
        report.due = Some(
            tracked
                .iter()
                .filter_map(|entry| {
                    let completed = is_completed(entry.task, settings, Some(entry.column_name));
                    due_data(entry.task, completed, now).map(|due| DueTask {
                        id: entry.task.id.clone(),
                        name: entry.task.name.clone(),
                        column: entry.column_name.to_owned(),
                        due,
                    })
                })
                .collect(),
        );
    }

    if let Some(selector) = &options.sprint {
        let selected = select_sprint(settings, selector, now)?;
        let duration_ms = selected.window.duration_ms();
        report.sprint = Some(SprintStatus {
            number: selected.number,
            name: selected.sprint.name.clone(),
            description: selected.sprint.description.clone(),
            window: selected.window,
            duration_ms,
            duration_message: humanize(duration_ms),
            fields: window_fields(&tracked, settings, selected.window, true),
        });
    }

    if !options.dates.is_empty() {
        let window = Window::from_dates(&options.dates)?;
        report.period = Some(PeriodStatus {
            window,
            fields: window_fields(&tracked, settings, window, false),
        });
    }

    Ok(report)
}

fn window_fields(
    tracked: &[Tracked<'_>],
    settings: &IndexOptions,
    window: Window,
    include_custom: bool,
) -> BTreeMap<String, WindowStats> {
    let custom = settings
        .custom_fields
        .iter()
        .filter(|declared| include_custom && declared.field_type == CustomFieldType::Date)
        .map(|declared| declared.name.as_str());

    WINDOW_FIELDS
        .into_iter()
        .chain(custom)
        .map(|field| {
            let mut stats = WindowStats::default();
            for entry in tracked {
                if entry
                    .task
                    .metadata
                    .date(field)
                    .is_some_and(|ts| window.contains(ts))
                {
                    stats.tasks.push(entry.task.id.clone());
                    stats.workload = stats.workload.saturating_add(workload(entry.task, settings));
                }
            }
            (field.to_owned(), stats)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsError;
    use crate::model::{CustomField, CustomValue, Sprint, UpdatePolicy};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-01-20 12:00:00 UTC);

    fn project() -> (Index, Vec<Task>) {
        let mut index = Index::new("Board");
        index.options.started_columns = vec!["Doing".into()];
        index.options.completed_columns = vec!["Done".into()];
        index.options.custom_fields = vec![CustomField {
            name: "reviewed".into(),
            field_type: CustomFieldType::Date,
            update_date: Some(UpdatePolicy::Once),
        }];
        index.options.sprints = vec![
            Sprint {
                name: "One".into(),
                description: "first".into(),
                start: datetime!(2024-01-01 00:00:00 UTC),
            },
            Sprint {
                name: "Two".into(),
                description: String::new(),
                start: datetime!(2024-01-15 00:00:00 UTC),
            },
        ];
        index.add_column("Todo").add_column("Doing").add_column("Done");

        let mut plan = Task::new("Plan", datetime!(2024-01-02 00:00:00 UTC));
        plan.metadata.tags = vec!["Large".into()];
        plan.metadata.assigned = Some("ann".into());
        plan.metadata.due = Some(datetime!(2024-01-19 12:00:00 UTC));

        let mut build = Task::new("Build", datetime!(2024-01-16 00:00:00 UTC));
        build.metadata.tags = vec!["Medium".into()];
        build.metadata.assigned = Some("ann".into());
        build.metadata.started = Some(datetime!(2024-01-17 00:00:00 UTC));
        build.metadata.progress = Some(0.5);
        build.metadata.custom.insert(
            "reviewed".into(),
            CustomValue::Date(datetime!(2024-01-18 00:00:00 UTC)),
        );

        let mut ship = Task::new("Ship", datetime!(2024-01-03 00:00:00 UTC));
        ship.metadata.tags = vec!["Small".into()];
        ship.metadata.completed = Some(datetime!(2024-01-16 00:00:00 UTC));
        ship.metadata.due = Some(datetime!(2024-01-21 12:00:00 UTC));

        let stray = Task::new("Stray", datetime!(2024-01-16 00:00:00 UTC));

        index
            .add_task_to_column("plan", "Todo", None)
            .add_task_to_column("build", "Doing", None)
            .add_task_to_column("ship", "Done", None);
        (index, vec![plan, build, ship, stray])
    }

    fn run(options: &StatusOptions) -> StatusReport {
        let (index, tasks) = project();
        status(&index, &tasks, options, NOW).unwrap_or_else(|err| panic!("status: {err}"))
    }

    #[test]
    fn totals_cover_tracked_tasks_only() {
        let report = run(&StatusOptions::default());
        assert_eq!(report.tasks, 3);
        assert_eq!(report.started_tasks, 1);
        assert_eq!(report.completed_tasks, 1);
        assert_eq!(report.total_workload, 5 + 3 + 2);
        assert_eq!(report.total_remaining_workload, 5 + 2);
        assert_eq!(
            report.columns.iter().map(|c| (c.name.as_str(), c.tasks)).collect::<Vec<_>>(),
            vec![("Todo", 1), ("Doing", 1), ("Done", 1)]
        );
        assert_eq!(
            report.assigned.get("ann"),
            Some(&AssigneeStatus {
                tasks: 2,
                workload: 8,
                remaining_workload: 7,
            })
        );
        assert!(report.due.is_none());
        assert!(report.sprint.is_none());
        assert!(report.task_workloads.iter().all(|task| task.id != "stray"));
    }

    #[test]
    fn huge_tag_weights_saturate_totals() {
        let mut index = Index::new("Board");
        index.options.task_workload_tags = Some(BTreeMap::from([("Huge".to_owned(), u32::MAX)]));
        index
            .add_task_to_column("one", "Todo", None)
            .add_task_to_column("two", "Todo", None);
        let tasks: Vec<Task> = ["One", "Two"]
            .into_iter()
            .map(|name| {
                let mut task = Task::new(name, NOW);
                task.metadata.tags = vec!["Huge".into()];
                task.metadata.assigned = Some("ann".into());
                task
            })
            .collect();

        let report = status(&index, &tasks, &StatusOptions::default(), NOW)
            .unwrap_or_else(|err| panic!("status: {err}"));
        assert_eq!(report.total_workload, u32::MAX);
        assert_eq!(report.total_remaining_workload, u32::MAX);
        assert_eq!(report.columns[0].workload, u32::MAX);
        assert_eq!(report.assigned["ann"].workload, u32::MAX);
    }

    #[test]
    fn due_list_reports_overdue_and_completed() {
        let report = run(&StatusOptions {
            due: true,
            ..StatusOptions::default()
        });
        let Some(due) = report.due else {
            panic!("due list expected");
        };
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, "plan");
        assert_eq!(due[0].due.message, "1 day overdue");
        assert!(due[0].due.overdue);
        assert_eq!(due[1].due.message, "Completed 5 days, 12 hours remaining");
    }

    #[test]
    fn sprint_windows_include_custom_dates() {
        let report = run(&StatusOptions {
            sprint: Some(SprintSelector::Current),
            ..StatusOptions::default()
        });
        let Some(sprint) = report.sprint else {
            panic!("sprint stats expected");
        };
        assert_eq!((sprint.number, sprint.name.as_str()), (2, "Two"));
        assert_eq!(sprint.duration_message, "5 days, 12 hours");
        assert_eq!(sprint.fields["created"].tasks, vec!["build"]);
        assert_eq!(sprint.fields["started"].workload, 3);
        assert_eq!(sprint.fields["completed"].tasks, vec!["ship"]);
        assert!(sprint.fields["due"].tasks.contains(&"plan".to_owned()));
        assert_eq!(sprint.fields["reviewed"].tasks, vec!["build"]);
    }

    #[test]
    fn period_covers_whole_days() {
        let report = run(&StatusOptions {
            dates: vec![datetime!(2024-01-02 18:00:00 UTC)],
            ..StatusOptions::default()
        });
        let Some(period) = report.period else {
            panic!("period stats expected");
        };
        assert_eq!(period.fields["created"].tasks, vec!["plan"]);
        assert!(!period.fields.contains_key("reviewed"));
    }

    #[test]
    fn unknown_sprint_is_an_error() {
        let (index, tasks) = project();
        let result = status(
            &index,
            &tasks,
            &StatusOptions {
                sprint: Some(SprintSelector::Number(9)),
                ..StatusOptions::default()
            },
            NOW,
        );
        assert!(matches!(result, Err(AnalyticsError::SprintNotFound(_))));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let report = run(&StatusOptions {
            due: true,
            ..StatusOptions::default()
        });
        let json = serde_json::to_value(&report).unwrap_or_else(|err| panic!("json: {err}"));

        assert_eq!(json["startedTasks"], 1);
        assert!(json.get("totalRemainingWorkload").is_some());
        assert_eq!(json["taskWorkloads"][0]["id"], "plan");
        assert_eq!(json["due"][0]["dueDate"], "2024-01-19T12:00:00Z");
        assert!(json["due"][0].get("message").is_some());
        assert!(json.get("sprint").is_none());
        assert!(json.get("period").is_none());
    }
}
