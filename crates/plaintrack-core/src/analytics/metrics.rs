use crate::model::{IndexOptions, Task};

/// Sum of the tag weights a task carries, or the default workload when none
/// of its tags is weighted.
#[must_use]
pub fn workload(task: &Task, options: &IndexOptions) -> u32 {
    let mut weighted = false;
    let mut total = 0_u32;
    for tag in &task.metadata.tags {
        if let Some(weight) = options.tag_weight(tag) {
            weighted = true;
            total = total.saturating_add(weight);
        }
    }
    if weighted { total } else { options.default_workload() }
}

/// True when the task has a completed date or sits in a completed column.
#[must_use]
pub fn is_completed(task: &Task, options: &IndexOptions, column: Option<&str>) -> bool {
    task.metadata.completed.is_some() || column.is_some_and(|name| options.is_completed_column(name))
}

/// True when the task has a started date or sits in a started column.
#[must_use]
pub fn is_started(task: &Task, options: &IndexOptions, column: Option<&str>) -> bool {
    task.metadata.started.is_some() || column.is_some_and(|name| options.is_started_column(name))
}

/// Completion fraction in `0..=1`.
#[must_use]
pub fn progress(task: &Task, options: &IndexOptions, column: Option<&str>) -> f64 {
    if is_completed(task, options, column) {
        1.0
    } else {
        task.metadata.progress.unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

/// `ceil(workload * (1 - progress))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn remaining_workload(task: &Task, options: &IndexOptions, column: Option<&str>) -> u32 {
    let total = workload(task, options);
    let remaining = (f64::from(total) * (1.0 - progress(task, options, column))).ceil();
    remaining.clamp(0.0, f64::from(total)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    fn tagged(tags: &[&str]) -> Task {
        let mut task = Task::new("T", datetime!(2024-01-01 00:00:00 UTC));
        task.metadata.tags = tags.iter().map(|tag| (*tag).to_owned()).collect();
        task
    }

    #[test]
    fn workload_sums_weighted_tags() {
        let options = IndexOptions::default();
        assert_eq!(workload(&tagged(&["a", "b", "c"]), &options), 2);
        assert_eq!(workload(&tagged(&["Medium", "Tiny"]), &options), 4);
        assert_eq!(workload(&tagged(&["Nothing"]), &options), 0);
        assert_eq!(workload(&tagged(&[]), &options), 2);
    }

    #[test]
    fn workload_uses_configured_table() {
        let options = IndexOptions {
            task_workload_tags: Some(BTreeMap::from([("XL".to_owned(), 13)])),
            default_task_workload: Some(1),
            ..IndexOptions::default()
        };
        assert_eq!(workload(&tagged(&["XL", "Huge"]), &options), 13);
        assert_eq!(workload(&tagged(&["Huge"]), &options), 1);
    }

    #[test]
    fn progress_and_remaining() {
        let options = IndexOptions {
            completed_columns: vec!["Done".into()],
            ..IndexOptions::default()
        };
        let mut task = tagged(&["Large"]);
        assert!((progress(&task, &options, Some("Todo"))).abs() < f64::EPSILON);
        assert_eq!(remaining_workload(&task, &options, Some("Todo")), 5);

        task.metadata.progress = Some(0.5);
        assert_eq!(remaining_workload(&task, &options, Some("Todo")), 3);

        assert!((progress(&task, &options, Some("Done")) - 1.0).abs() < f64::EPSILON);
        assert_eq!(remaining_workload(&task, &options, Some("Done")), 0);

        task.metadata.completed = Some(datetime!(2024-01-05 00:00:00 UTC));
        assert!(is_completed(&task, &options, None));
        assert_eq!(remaining_workload(&task, &options, None), 0);
    }

    #[test]
    fn started_follows_date_or_column() {
        let options = IndexOptions {
            started_columns: vec!["Doing".into()],
            ..IndexOptions::default()
        };
        let mut task = tagged(&[]);
        assert!(!is_started(&task, &options, Some("Todo")));
        assert!(is_started(&task, &options, Some("Doing")));
        task.metadata.started = Some(datetime!(2024-01-02 00:00:00 UTC));
        assert!(is_started(&task, &options, None));
    }
}
