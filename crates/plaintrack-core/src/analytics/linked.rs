use time::OffsetDateTime;

use crate::model::{CustomFieldType, IndexOptions, Task, UpdatePolicy};

/// A date field stamped automatically when a task enters one of its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedField<'a> {
    /// Built-in or custom date field name.
    pub field: &'a str,
    /// How an existing value is treated.
    pub policy: UpdatePolicy,
    /// Columns that trigger the update.
    pub columns: Vec<&'a str>,
}

impl LinkedField<'_> {
    /// Stamp `now` into the field if `column` is linked and the policy allows.
    /// Returns whether the task changed.
    pub fn apply(&self, task: &mut Task, column: &str, now: OffsetDateTime) -> bool {
        if !self.columns.contains(&column) {
            return false;
        }
        let write = match self.policy {
            UpdatePolicy::None => false,
            UpdatePolicy::Once => task.metadata.date(self.field).is_none(),
            UpdatePolicy::Always => true,
        };
        if write {
            task.metadata.set_date(self.field, now);
        }
        write
    }
}

/// Every column-linked date field: `started` and `completed` (set once) and
/// each declared date custom field with its own policy.
#[must_use]
pub fn linked_fields(options: &IndexOptions) -> Vec<LinkedField<'_>> {
    let builtins = ["started", "completed"].into_iter().map(|field| LinkedField {
        field,
        policy: UpdatePolicy::Once,
        columns: options.linked_columns(field),
    });
    let custom = options
        .custom_fields
        .iter()
        .filter(|declared| declared.field_type == CustomFieldType::Date)
        .map(|declared| LinkedField {
            field: declared.name.as_str(),
            policy: declared.update_date.unwrap_or_default(),
            columns: options.linked_columns(&declared.name),
        });
    builtins.chain(custom).collect()
}

/// Apply every linked field for a task that was moved into `column`.
/// Returns the names of the fields that were written.
pub fn update_column_linked_fields(
    task: &mut Task,
    options: &IndexOptions,
    column: &str,
    now: OffsetDateTime,
) -> Vec<String> {
    linked_fields(options)
        .iter()
        .filter(|linked| linked.apply(task, column, now))
        .map(|linked| linked.field.to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomField, CustomValue};
    use serde_yaml::Value;
    use time::macros::datetime;

    fn options() -> IndexOptions {
        let mut options = IndexOptions {
            started_columns: vec!["Doing".into()],
            completed_columns: vec!["Done".into()],
            custom_fields: vec![
                CustomField {
                    name: "reviewed".into(),
                    field_type: CustomFieldType::Date,
                    update_date: Some(UpdatePolicy::Always),
                },
                CustomField {
                    name: "touched".into(),
                    field_type: CustomFieldType::Date,
                    update_date: None,
                },
            ],
            ..IndexOptions::default()
        };
        options
            .extra
            .insert("reviewedColumns".into(), Value::Sequence(vec![Value::from("Review")]));
        options
            .extra
            .insert("touchedColumns".into(), Value::Sequence(vec![Value::from("Review")]));
        options
    }

    #[test]
    fn builtins_are_set_once() {
        let options = options();
        let mut task = Task::new("T", datetime!(2024-01-01 00:00:00 UTC));
        let first = datetime!(2024-01-02 00:00:00 UTC);
        let second = datetime!(2024-01-03 00:00:00 UTC);

        assert_eq!(
            update_column_linked_fields(&mut task, &options, "Doing", first),
            vec!["started"]
        );
        assert!(update_column_linked_fields(&mut task, &options, "Doing", second).is_empty());
        assert_eq!(task.metadata.started, Some(first));
        assert!(update_column_linked_fields(&mut task, &options, "Todo", second).is_empty());
        assert_eq!(task.metadata.completed, None);
    }

    #[test]
    fn custom_policies_are_honoured() {
        let options = options();
        let mut task = Task::new("T", datetime!(2024-01-01 00:00:00 UTC));
        let first = datetime!(2024-01-02 00:00:00 UTC);
        let second = datetime!(2024-01-03 00:00:00 UTC);

        assert_eq!(
            update_column_linked_fields(&mut task, &options, "Review", first),
            vec!["reviewed"]
        );
        update_column_linked_fields(&mut task, &options, "Review", second);
        assert_eq!(
            task.metadata.custom.get("reviewed"),
            Some(&CustomValue::Date(second))
        );
        assert!(!task.metadata.custom.contains_key("touched"));
    }
}
