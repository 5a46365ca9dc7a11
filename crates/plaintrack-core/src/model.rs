use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use time::OffsetDateTime;

use crate::id::{InvalidTaskName, checked_task_id, task_id};
use crate::query::{QueryError, QueryResult, Sorter, sort_tasks};

/// Workload used when none of a task's tags carries a weight.
pub const DEFAULT_TASK_WORKLOAD: u32 = 2;

/// Tag weights used when the index does not configure `taskWorkloadTags`.
pub const DEFAULT_WORKLOAD_TAGS: [(&str, u32); 6] = [
    ("Nothing", 0),
    ("Tiny", 1),
    ("Small", 2),
    ("Medium", 3),
    ("Large", 5),
    ("Huge", 8),
];

/// A named, ordered bucket of task identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column heading.
    pub name: String,
    /// Task identifiers in display order.
    pub tasks: Vec<String>,
}

impl Column {
    /// Create an empty column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }
}

/// Top-level project record: name, options and the column layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Index {
    /// Project name (level-1 heading).
    pub name: String,
    /// Free-text description below the name heading.
    pub description: String,
    /// Project options from front matter and the `Options` section.
    pub options: IndexOptions,
    /// Columns in file order.
    pub columns: Vec<Column>,
}

impl Index {
    /// Create an index with no columns and default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    /// Append an empty column unless one with the same name exists.
    pub fn add_column(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if self.column(&name).is_none() {
            self.columns.push(Column::new(name));
        }
        self
    }

    /// Name of the column currently holding `id`.
    #[must_use]
    pub fn task_column(&self, id: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|column| column.tasks.iter().any(|task| task == id))
            .map(|column| column.name.as_str())
    }

    /// True when `id` is listed in any column.
    #[must_use]
    pub fn contains_task(&self, id: &str) -> bool {
        self.task_column(id).is_some()
    }

    /// Every task identifier, column by column.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .flat_map(|column| column.tasks.iter().map(String::as_str))
    }

    /// Place `id` in `column`, removing it from wherever it was before.
    ///
    /// `position` inserts at that offset (clamped to the column length);
    /// `None` appends. A column that does not exist yet is created at the end.
    pub fn add_task_to_column(&mut self, id: &str, column: &str, position: Option<usize>) -> &mut Self {
        self.remove_task_from_all_columns(id);
        self.add_column(column);
        if let Some(target) = self.column_mut(column) {
            let at = position.map_or(target.tasks.len(), |pos| pos.min(target.tasks.len()));
            target.tasks.insert(at, id.to_owned());
        }
        self
    }

    /// Drop `id` from every column.
    pub fn remove_task_from_all_columns(&mut self, id: &str) -> &mut Self {
        for column in &mut self.columns {
            column.tasks.retain(|task| task != id);
        }
        self
    }

    /// Replace `old_id` with `new_id` in place, keeping its position.
    pub fn rename_task_everywhere(&mut self, old_id: &str, new_id: &str) -> &mut Self {
        for column in &mut self.columns {
            for task in &mut column.tasks {
                if task == old_id {
                    new_id.clone_into(task);
                }
            }
        }
        self
    }

    /// Reorder one column by `sorters`.
    ///
    /// `tasks` supplies the records for the column's identifiers; identifiers
    /// without a record keep their relative order after the sorted ones. When
    /// `save` is set the sorters are stored under `columnSorting` so that later
    /// saves re-apply them (an empty sorter list clears the saved entry).
    ///
    /// # Errors
    /// Returns an error for an unknown column, an unknown sort field, or an
    /// invalid extraction pattern.
    pub fn sort_column(
        &mut self,
        column: &str,
        tasks: &[Task],
        sorters: &[Sorter],
        save: bool,
    ) -> QueryResult<&mut Self> {
        let current = self
            .column(column)
            .ok_or_else(|| QueryError::UnknownColumn(column.to_owned()))?;
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|task| (task.id.as_str(), task)).collect();

        let mut known = Vec::with_capacity(current.tasks.len());
        let mut missing = Vec::new();
        for id in &current.tasks {
            match by_id.get(id.as_str()) {
                Some(task) => known.push(*task),
                None => missing.push(id.clone()),
            }
        }

        let sorted = sort_tasks(self, known, sorters)?;
        let mut order: Vec<String> = sorted.into_iter().map(|task| task.id.clone()).collect();
        order.extend(missing);

        if let Some(target) = self.column_mut(column) {
            target.tasks = order;
        }
        if save {
            if sorters.is_empty() {
                self.options.column_sorting.remove(column);
            } else {
                self.options
                    .column_sorting
                    .insert(column.to_owned(), sorters.to_vec());
            }
        }
        Ok(self)
    }

    /// Append a sprint and return its 1-based number.
    pub fn add_sprint(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        start: OffsetDateTime,
    ) -> usize {
        self.options.sprints.push(Sprint {
            name: name.into(),
            description: description.into(),
            start,
        });
        self.options.sprints.len()
    }
}

/// Open configuration mapping stored with the index.
///
/// Well-known keys are typed; anything else is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexOptions {
    /// Columns whose tasks count as started.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub started_columns: Vec<String>,
    /// Columns whose tasks count as completed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_columns: Vec<String>,
    /// Columns hidden from board views.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_columns: Vec<String>,
    /// Declared custom metadata fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomField>,
    /// Saved per-column sort configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_sorting: BTreeMap<String, Vec<Sorter>>,
    /// Sprints in start order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sprints: Vec<Sprint>,
    /// Tag to workload weight table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_workload_tags: Option<BTreeMap<String, u32>>,
    /// Workload used when no tag weight applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_task_workload: Option<u32>,
    /// Unrecognized keys, preserved for round trips.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndexOptions {
    /// True when nothing is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when `column` is declared as a completed column.
    #[must_use]
    pub fn is_completed_column(&self, column: &str) -> bool {
        self.completed_columns.iter().any(|name| name == column)
    }

    /// True when `column` is declared as a started column.
    #[must_use]
    pub fn is_started_column(&self, column: &str) -> bool {
        self.started_columns.iter().any(|name| name == column)
    }

    /// Columns linked to a date field through the `<field>Columns` option.
    #[must_use]
    pub fn linked_columns(&self, field: &str) -> Vec<&str> {
        match field {
            "started" => self.started_columns.iter().map(String::as_str).collect(),
            "completed" => self.completed_columns.iter().map(String::as_str).collect(),
            other => self
                .extra
                .get(&format!("{other}Columns"))
                .and_then(Value::as_sequence)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
        }
    }

    /// Weight configured for `tag`, falling back to the default table.
    #[must_use]
    pub fn tag_weight(&self, tag: &str) -> Option<u32> {
        match &self.task_workload_tags {
            Some(table) => table.get(tag).copied(),
            None => DEFAULT_WORKLOAD_TAGS
                .iter()
                .find(|(name, _)| *name == tag)
                .map(|(_, weight)| *weight),
        }
    }

    /// Workload for tasks without any weighted tag.
    #[must_use]
    pub fn default_workload(&self) -> u32 {
        self.default_task_workload.unwrap_or(DEFAULT_TASK_WORKLOAD)
    }

    /// Declaration of the custom field `name`.
    #[must_use]
    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|field| field.name == name)
    }

    /// Sprints paired with their 1-based numbers.
    pub fn numbered_sprints(&self) -> impl Iterator<Item = (usize, &Sprint)> {
        self.sprints.iter().enumerate().map(|(idx, sprint)| (idx + 1, sprint))
    }
}

/// Declared type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    /// Free text.
    String,
    /// Numeric value.
    Number,
    /// `true` / `false`.
    Boolean,
    /// Timestamp.
    Date,
}

/// How a column-linked date field reacts when a task enters a linked column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// Never touched.
    #[default]
    None,
    /// Set only when empty.
    Once,
    /// Overwritten every time.
    Always,
}

/// A user-declared metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    /// Metadata key.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    /// Column-link update policy (date fields only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_date: Option<UpdatePolicy>,
}

/// A named, dated period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    /// Sprint name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Start of the sprint.
    #[serde(with = "crate::timestamp::serde_timestamp")]
    pub start: OffsetDateTime,
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Identifier derived from the name.
    pub id: String,
    /// Task name (level-1 heading).
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Typed metadata.
    pub metadata: TaskMetadata,
    /// Checklist items.
    pub sub_tasks: Vec<SubTask>,
    /// Links to other tasks.
    pub relations: Vec<Relation>,
    /// Discussion entries.
    pub comments: Vec<Comment>,
}

impl Task {
    /// Create a task named `name`, created at `now`.
    pub fn new(name: impl Into<String>, now: OffsetDateTime) -> Self {
        let name = name.into();
        Self {
            id: task_id(&name),
            name,
            description: String::new(),
            metadata: TaskMetadata {
                created: Some(now),
                ..TaskMetadata::default()
            },
            sub_tasks: Vec::new(),
            relations: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Rename the task, re-deriving its identifier. Returns the previous id.
    ///
    /// # Errors
    /// Returns [`InvalidTaskName`] and leaves the task untouched when `name`
    /// derives an empty identifier.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<String, InvalidTaskName> {
        let name = name.into();
        let id = checked_task_id(&name)?;
        self.name = name;
        Ok(std::mem::replace(&mut self.id, id))
    }
}

/// Typed task metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskMetadata {
    /// Creation time.
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    /// Last modification time.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
    /// When work started.
    #[serde(with = "time::serde::rfc3339::option")]
    pub started: Option<OffsetDateTime>,
    /// When the task was completed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed: Option<OffsetDateTime>,
    /// Due date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub due: Option<OffsetDateTime>,
    /// Assignee.
    pub assigned: Option<String>,
    /// Stored progress fraction (0..=1).
    pub progress: Option<f64>,
    /// Tags in file order.
    pub tags: Vec<String>,
    /// Custom field values.
    pub custom: BTreeMap<String, CustomValue>,
}

impl TaskMetadata {
    /// Value of a built-in or custom date field.
    #[must_use]
    pub fn date(&self, field: &str) -> Option<OffsetDateTime> {
        match field {
            "created" => self.created,
            "updated" => self.updated,
            "started" => self.started,
            "completed" => self.completed,
            "due" => self.due,
            other => match self.custom.get(other) {
                Some(CustomValue::Date(ts)) => Some(*ts),
                _ => None,
            },
        }
    }

    /// Set a built-in or custom date field.
    pub fn set_date(&mut self, field: &str, ts: OffsetDateTime) {
        match field {
            "created" => self.created = Some(ts),
            "updated" => self.updated = Some(ts),
            "started" => self.started = Some(ts),
            "completed" => self.completed = Some(ts),
            "due" => self.due = Some(ts),
            other => {
                self.custom.insert(other.to_owned(), CustomValue::Date(ts));
            }
        }
    }
}

/// A custom field value carrying its type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CustomValue {
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Timestamp value.
    Date(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
}

/// A checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTask {
    /// Item text.
    pub text: String,
    /// Whether the box is ticked.
    pub completed: bool,
}

/// A typed link to another task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    /// Target task identifier.
    pub task: String,
    /// Relation label such as `blocks` or `blocked by` (may be empty).
    #[serde(rename = "type")]
    pub relation_type: String,
}

/// A comment on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Comment author.
    pub author: String,
    /// When the comment was written.
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    /// Comment body.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use time::macros::datetime;

    fn board() -> Index {
        let mut index = Index::new("Project");
        index.add_column("Todo").add_column("Doing").add_column("Done");
        index
            .add_task_to_column("task-a", "Todo", None)
            .add_task_to_column("task-b", "Todo", None)
            .add_task_to_column("task-c", "Doing", None);
        index
    }

    #[test]
    fn adding_moves_task_between_columns() {
        let mut index = board();
        index.add_task_to_column("task-a", "Done", None);

        assert_eq!(index.task_column("task-a"), Some("Done"));
        assert_eq!(index.task_ids().filter(|id| *id == "task-a").count(), 1);
        assert_eq!(
            index.column("Todo").map(|column| column.tasks.clone()),
            Some(vec!["task-b".to_owned()])
        );
    }

    #[test]
    fn add_inserts_at_clamped_position() {
        let mut index = board();
        index.add_task_to_column("task-c", "Todo", Some(0));
        index.add_task_to_column("task-d", "Todo", Some(99));
        let Some(todo) = index.column("Todo") else {
            panic!("todo column must exist");
        };
        assert_eq!(todo.tasks, vec!["task-c", "task-a", "task-b", "task-d"]);
    }

    #[test]
    fn add_creates_missing_column() {
        let mut index = board();
        index.add_task_to_column("task-a", "Archive", None);
        assert_eq!(index.columns.last().map(|c| c.name.as_str()), Some("Archive"));
    }

    #[test]
    fn remove_and_rename() {
        let mut index = board();
        index.rename_task_everywhere("task-b", "task-z");
        assert_eq!(
            index.column("Todo").map(|column| column.tasks.clone()),
            Some(vec!["task-a".to_owned(), "task-z".to_owned()])
        );
        index.remove_task_from_all_columns("task-a");
        assert!(!index.contains_task("task-a"));
    }

    #[test]
    fn sort_column_saves_sorters() {
        let now = datetime!(2024-01-01 00:00:00 UTC);
        let mut index = board();
        let tasks = vec![Task::new("Task A", now), Task::new("Task B", now)];
        let sorters = vec![Sorter {
            field: "name".into(),
            filter: None,
            order: SortOrder::Descending,
        }];

        index
            .sort_column("Todo", &tasks, &sorters, true)
            .unwrap_or_else(|err| panic!("sort must succeed: {err}"));

        assert_eq!(
            index.column("Todo").map(|column| column.tasks.clone()),
            Some(vec!["task-b".to_owned(), "task-a".to_owned()])
        );
        assert_eq!(index.options.column_sorting.get("Todo"), Some(&sorters));

        index
            .sort_column("Todo", &tasks, &[], true)
            .unwrap_or_else(|err| panic!("sort must succeed: {err}"));
        assert!(index.options.column_sorting.is_empty());
    }

    #[test]
    fn sort_unknown_column_fails() {
        let mut index = board();
        let result = index.sort_column("Nope", &[], &[], false);
        assert!(matches!(result, Err(QueryError::UnknownColumn(name)) if name == "Nope"));
    }

    #[test]
    fn sprints_are_numbered_in_append_order() {
        let mut index = board();
        let first = index.add_sprint("One", "", datetime!(2024-01-01 00:00:00 UTC));
        let second = index.add_sprint("Two", "second", datetime!(2024-01-15 00:00:00 UTC));
        assert_eq!((first, second), (1, 2));
        let names: Vec<(usize, &str)> = index
            .options
            .numbered_sprints()
            .map(|(number, sprint)| (number, sprint.name.as_str()))
            .collect();
        assert_eq!(names, vec![(1, "One"), (2, "Two")]);
    }

    #[test]
    fn options_fall_back_to_default_weights() {
        let mut options = IndexOptions::default();
        assert!(options.is_empty());
        assert_eq!(options.tag_weight("Medium"), Some(3));
        assert_eq!(options.tag_weight("medium"), None);
        assert_eq!(options.default_workload(), DEFAULT_TASK_WORKLOAD);

        options.task_workload_tags = Some(BTreeMap::from([("XL".to_owned(), 13)]));
        options.default_task_workload = Some(1);
        assert_eq!(options.tag_weight("XL"), Some(13));
        assert_eq!(options.tag_weight("Medium"), None);
        assert_eq!(options.default_workload(), 1);
        assert!(!options.is_empty());
    }

    #[test]
    fn linked_columns_come_from_field_columns_keys() {
        let mut options = IndexOptions {
            started_columns: vec!["Doing".into()],
            ..IndexOptions::default()
        };
        options.extra.insert(
            "reviewedColumns".into(),
            Value::Sequence(vec![Value::from("Review"), Value::from("QA")]),
        );
        assert_eq!(options.linked_columns("started"), vec!["Doing"]);
        assert_eq!(options.linked_columns("reviewed"), vec!["Review", "QA"]);
        assert!(options.linked_columns("completed").is_empty());
    }

    #[test]
    fn rename_rederives_id() {
        let mut task = Task::new("Old name", datetime!(2024-01-01 00:00:00 UTC));
        let previous = task.rename("New Name");
        assert_eq!(previous, Ok("old-name".to_owned()));
        assert_eq!(task.id, "new-name");
        assert_eq!(task.metadata.created, Some(datetime!(2024-01-01 00:00:00 UTC)));
    }

    #[test]
    fn rename_to_wordless_name_is_rejected() {
        let mut task = Task::new("Keep me", datetime!(2024-01-01 00:00:00 UTC));
        for name in ["!!!", "   ", ""] {
            assert_eq!(task.rename(name), Err(InvalidTaskName(name.to_owned())));
        }
        assert_eq!((task.id.as_str(), task.name.as_str()), ("keep-me", "Keep me"));
    }

    #[test]
    fn metadata_date_accessors_cover_custom_fields() {
        let ts = datetime!(2024-03-01 12:00:00 UTC);
        let mut metadata = TaskMetadata::default();
        metadata.set_date("started", ts);
        metadata.set_date("reviewed", ts);
        assert_eq!(metadata.started, Some(ts));
        assert_eq!(metadata.date("reviewed"), Some(ts));
        assert_eq!(metadata.date("missing"), None);
    }
}
