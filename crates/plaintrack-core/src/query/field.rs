use std::collections::HashMap;
use std::fmt;

use time::OffsetDateTime;

use super::{QueryError, QueryResult};
use crate::analytics::{progress, remaining_workload, workload};
use crate::model::{CustomFieldType, CustomValue, Index, Task};
use crate::timestamp::format_timestamp;

/// Value shape a field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, matched with regular expressions.
    Text,
    /// Numeric value.
    Number,
    /// Timestamp, filtered by calendar day.
    Date,
    /// `true` / `false`.
    Boolean,
}

impl From<CustomFieldType> for FieldKind {
    fn from(value: CustomFieldType) -> Self {
        match value {
            CustomFieldType::String => Self::Text,
            CustomFieldType::Number => Self::Number,
            CustomFieldType::Boolean => Self::Boolean,
            CustomFieldType::Date => Self::Date,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        })
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text (list fields are joined by newlines).
    Text(String),
    /// Number.
    Number(f64),
    /// Timestamp.
    Date(OffsetDateTime),
    /// Flag.
    Boolean(bool),
}

impl FieldValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Number(_) => FieldKind::Number,
            Self::Date(_) => FieldKind::Date,
            Self::Boolean(_) => FieldKind::Boolean,
        }
    }

    /// Text rendering used by pattern extraction.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Date(ts) => format_timestamp(*ts),
            Self::Boolean(flag) => flag.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Builtin {
    Id,
    Name,
    Description,
    Column,
    Date(&'static str),
    Assigned,
    Tags,
    SubTasks,
    Relations,
    Comments,
    CountTags,
    CountSubTasks,
    CountRelations,
    CountComments,
    Workload,
    RemainingWorkload,
    Progress,
}

impl Builtin {
    fn parse(field: &str) -> Option<Self> {
        Some(match field {
            "id" => Self::Id,
            "name" => Self::Name,
            "description" => Self::Description,
            "column" => Self::Column,
            "created" => Self::Date("created"),
            "updated" => Self::Date("updated"),
            "started" => Self::Date("started"),
            "completed" => Self::Date("completed"),
            "due" => Self::Date("due"),
            "assigned" => Self::Assigned,
            "tag" | "tags" => Self::Tags,
            "sub-task" | "sub-tasks" => Self::SubTasks,
            "relation" | "relations" => Self::Relations,
            "comment" | "comments" => Self::Comments,
            "count-tags" => Self::CountTags,
            "count-sub-tasks" => Self::CountSubTasks,
            "count-relations" => Self::CountRelations,
            "count-comments" => Self::CountComments,
            "workload" => Self::Workload,
            "remaining-workload" => Self::RemainingWorkload,
            "progress" => Self::Progress,
            _ => return None,
        })
    }

    const fn kind(self) -> FieldKind {
        match self {
            Self::Id
            | Self::Name
            | Self::Description
            | Self::Column
            | Self::Assigned
            | Self::Tags
            | Self::SubTasks
            | Self::Relations
            | Self::Comments => FieldKind::Text,
            Self::Date(_) => FieldKind::Date,
            Self::CountTags
            | Self::CountSubTasks
            | Self::CountRelations
            | Self::CountComments
            | Self::Workload
            | Self::RemainingWorkload
            | Self::Progress => FieldKind::Number,
        }
    }
}

/// A field name resolved once, read for many tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Accessor<'a> {
    Builtin(Builtin),
    Custom { name: &'a str, kind: FieldKind },
}

impl Accessor<'_> {
    pub(super) const fn kind(&self) -> FieldKind {
        match self {
            Self::Builtin(builtin) => builtin.kind(),
            Self::Custom { kind, .. } => *kind,
        }
    }
}

/// Maps field names to typed values for tasks of one index.
///
/// Built-in fields take precedence over custom fields of the same name.
#[derive(Debug, Clone)]
pub struct FieldResolver<'a> {
    index: &'a Index,
    columns: HashMap<&'a str, &'a str>,
}

impl<'a> FieldResolver<'a> {
    /// Resolver over the fields and column layout of `index`.
    #[must_use]
    pub fn new(index: &'a Index) -> Self {
        let columns = index
            .columns
            .iter()
            .flat_map(|column| {
                column
                    .tasks
                    .iter()
                    .map(move |id| (id.as_str(), column.name.as_str()))
            })
            .collect();
        Self { index, columns }
    }

    pub(super) fn accessor(&self, field: &str) -> QueryResult<Accessor<'a>> {
        if let Some(builtin) = Builtin::parse(field) {
            return Ok(Accessor::Builtin(builtin));
        }
        self.index
            .options
            .custom_field(field)
            .map(|declared| Accessor::Custom {
                name: declared.name.as_str(),
                kind: declared.field_type.into(),
            })
            .ok_or_else(|| QueryError::UnknownField(field.to_owned()))
    }

    /// Kind of `field`.
    ///
    /// # Errors
    /// Returns [`QueryError::UnknownField`] for an unrecognized field.
    pub fn kind(&self, field: &str) -> QueryResult<FieldKind> {
        self.accessor(field).map(|accessor| accessor.kind())
    }

    /// Value of `field` for `task`, or `None` when the task has no value.
    ///
    /// # Errors
    /// Returns [`QueryError::UnknownField`] for an unrecognized field.
    pub fn value(&self, task: &Task, field: &str) -> QueryResult<Option<FieldValue>> {
        self.accessor(field).map(|accessor| self.read(accessor, task))
    }

    /// Column currently holding `task`.
    #[must_use]
    pub fn column_of(&self, task: &Task) -> Option<&'a str> {
        self.columns.get(task.id.as_str()).copied()
    }

    pub(super) fn read(&self, accessor: Accessor<'_>, task: &Task) -> Option<FieldValue> {
        let builtin = match accessor {
            Accessor::Builtin(builtin) => builtin,
            Accessor::Custom { name, .. } => {
                return task.metadata.custom.get(name).map(|value| match value {
                    CustomValue::String(text) => FieldValue::Text(text.clone()),
                    CustomValue::Number(number) => FieldValue::Number(*number),
                    CustomValue::Boolean(flag) => FieldValue::Boolean(*flag),
                    CustomValue::Date(ts) => FieldValue::Date(*ts),
                });
            }
        };

        let options = &self.index.options;
        let value = match builtin {
            Builtin::Id => FieldValue::Text(task.id.clone()),
            Builtin::Name => FieldValue::Text(task.name.clone()),
            Builtin::Description => FieldValue::Text(task.description.clone()),
            Builtin::Column => FieldValue::Text(self.column_of(task)?.to_owned()),
            Builtin::Date(name) => FieldValue::Date(task.metadata.date(name)?),
            Builtin::Assigned => FieldValue::Text(task.metadata.assigned.clone()?),
            Builtin::Tags => FieldValue::Text(task.metadata.tags.join("\n")),
            Builtin::SubTasks => FieldValue::Text(joined(task.sub_tasks.iter().map(|sub| {
                format!("[{}] {}", if sub.completed { 'x' } else { ' ' }, sub.text)
            }))),
            Builtin::Relations => FieldValue::Text(joined(task.relations.iter().map(|relation| {
                format!("{} {}", relation.relation_type, relation.task)
                    .trim()
                    .to_owned()
            }))),
            Builtin::Comments => FieldValue::Text(joined(
                task.comments
                    .iter()
                    .map(|comment| format!("{} {}", comment.author, comment.text)),
            )),
            Builtin::CountTags => FieldValue::Number(count(task.metadata.tags.len())),
            Builtin::CountSubTasks => FieldValue::Number(count(task.sub_tasks.len())),
            Builtin::CountRelations => FieldValue::Number(count(task.relations.len())),
            Builtin::CountComments => FieldValue::Number(count(task.comments.len())),
            Builtin::Workload => FieldValue::Number(f64::from(workload(task, options))),
            Builtin::RemainingWorkload => FieldValue::Number(f64::from(remaining_workload(
                task,
                options,
                self.column_of(task),
            ))),
            Builtin::Progress => FieldValue::Number(progress(task, options, self.column_of(task))),
        };
        Some(value)
    }
}

fn joined(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join("\n")
}

#[allow(clippy::cast_precision_loss)]
const fn count(len: usize) -> f64 {
    len as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, CustomField, Relation, SubTask};
    use time::macros::datetime;

    fn fixture() -> (Index, Task) {
        let mut index = Index::new("P");
        index.options.completed_columns = vec!["Done".into()];
        index.options.custom_fields = vec![CustomField {
            name: "points".into(),
            field_type: CustomFieldType::Number,
            update_date: None,
        }];
        index.add_task_to_column("write-docs", "Done", None);

        let mut task = Task::new("Write docs", datetime!(2024-01-01 00:00:00 UTC));
        task.metadata.tags = vec!["Medium".into(), "docs".into()];
        task.metadata.custom.insert("points".into(), CustomValue::Number(8.0));
        task.sub_tasks = vec![SubTask {
            text: "outline".into(),
            completed: true,
        }];
        task.relations = vec![Relation {
            task: "release".into(),
            relation_type: "blocks".into(),
        }];
        task.comments = vec![Comment {
            author: "ann".into(),
            date: None,
            text: "looks good".into(),
        }];
        (index, task)
    }

    fn value(resolver: &FieldResolver<'_>, task: &Task, field: &str) -> Option<FieldValue> {
        resolver
            .value(task, field)
            .unwrap_or_else(|err| panic!("field {field} must resolve: {err}"))
    }

    #[test]
    fn resolves_builtin_text_projections() {
        let (index, task) = fixture();
        let resolver = FieldResolver::new(&index);
        assert_eq!(
            value(&resolver, &task, "tags"),
            Some(FieldValue::Text("Medium\ndocs".into()))
        );
        assert_eq!(value(&resolver, &task, "tag"), value(&resolver, &task, "tags"));
        assert_eq!(
            value(&resolver, &task, "sub-task"),
            Some(FieldValue::Text("[x] outline".into()))
        );
        assert_eq!(
            value(&resolver, &task, "relations"),
            Some(FieldValue::Text("blocks release".into()))
        );
        assert_eq!(
            value(&resolver, &task, "comment"),
            Some(FieldValue::Text("ann looks good".into()))
        );
        assert_eq!(
            value(&resolver, &task, "column"),
            Some(FieldValue::Text("Done".into()))
        );
    }

    #[test]
    fn resolves_numbers_and_missing_values() {
        let (index, task) = fixture();
        let resolver = FieldResolver::new(&index);
        assert_eq!(value(&resolver, &task, "count-tags"), Some(FieldValue::Number(2.0)));
        assert_eq!(value(&resolver, &task, "workload"), Some(FieldValue::Number(3.0)));
        assert_eq!(value(&resolver, &task, "progress"), Some(FieldValue::Number(1.0)));
        assert_eq!(
            value(&resolver, &task, "remaining-workload"),
            Some(FieldValue::Number(0.0))
        );
        assert_eq!(value(&resolver, &task, "points"), Some(FieldValue::Number(8.0)));
        assert_eq!(value(&resolver, &task, "due"), None);
        assert_eq!(value(&resolver, &task, "assigned"), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let (index, task) = fixture();
        let resolver = FieldResolver::new(&index);
        assert_eq!(
            resolver.value(&task, "colour"),
            Err(QueryError::UnknownField("colour".into()))
        );
        assert_eq!(resolver.kind("points"), Ok(FieldKind::Number));
        assert_eq!(resolver.kind("created"), Ok(FieldKind::Date));
    }
}
