use std::borrow::Borrow;
use std::cmp::Ordering;

use icu_collator::options::{CollatorOptions, Strength};
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::field::{Accessor, FieldKind, FieldResolver, FieldValue};
use super::{QueryResult, compile_pattern};
use crate::model::{Index, Task};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One key of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    /// Field to read.
    pub field: String,
    /// Extraction pattern applied to the field text before comparing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Direction.
    #[serde(default)]
    pub order: SortOrder,
}

impl Sorter {
    /// Ascending sorter on `field` without extraction.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            filter: None,
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Text(String),
    Number(f64),
    Instant(i128),
    Flag(bool),
}

impl SortKey {
    fn compare(&self, other: &Self, collator: Option<&CollatorBorrowed<'_>>) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => {
                collator.map_or_else(|| a.cmp(b), |collator| collator.compare(a, b))
            }
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Instant(a), Self::Instant(b)) => a.cmp(b),
            (Self::Flag(a), Self::Flag(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

struct CompiledSorter<'a> {
    accessor: Accessor<'a>,
    extract: Option<Regex>,
    order: SortOrder,
}

impl CompiledSorter<'_> {
    /// Extraction turns any field into text, so an extracted number compares
    /// as its digits (`10` before `9`).
    fn key(&self, resolver: &FieldResolver<'_>, task: &Task) -> SortKey {
        let kind = self.accessor.kind();
        let value = resolver.read(self.accessor, task);

        if let Some(pattern) = &self.extract {
            let text = value.map(|value| value.to_text()).unwrap_or_default();
            return SortKey::Text(extract(pattern, &text));
        }

        match (kind, value) {
            (_, Some(FieldValue::Text(text))) => SortKey::Text(text),
            (_, Some(FieldValue::Number(number))) => SortKey::Number(number),
            (_, Some(FieldValue::Date(ts))) => SortKey::Instant(ts.unix_timestamp_nanos()),
            (_, Some(FieldValue::Boolean(flag))) => SortKey::Flag(flag),
            (FieldKind::Text, None) => SortKey::Text(String::new()),
            (FieldKind::Number, None) => SortKey::Number(0.0),
            (FieldKind::Date, None) => SortKey::Instant(0),
            (FieldKind::Boolean, None) => SortKey::Flag(false),
        }
    }
}

/// Concatenate, over every match: the named groups if the pattern has any,
/// else the first group, else the whole match.
fn extract(pattern: &Regex, text: &str) -> String {
    let named: Vec<&str> = pattern.capture_names().flatten().collect();
    let mut out = String::new();
    for captures in pattern.captures_iter(text) {
        if !named.is_empty() {
            for name in &named {
                if let Some(group) = captures.name(name) {
                    out.push_str(group.as_str());
                }
            }
        } else if let Some(group) = captures.get(1).or_else(|| captures.get(0)) {
            out.push_str(group.as_str());
        }
    }
    out
}

/// Root-locale collator at primary strength: base letters decide, case and
/// accents do not.
fn text_collator() -> Option<CollatorBorrowed<'static>> {
    let mut options = CollatorOptions::default();
    options.strength = Some(Strength::Primary);
    Collator::try_new(CollatorPreferences::default(), options).ok()
}

/// Stable multi-key sort of `tasks` by `sorters`.
///
/// An empty sorter list returns the input order unchanged.
///
/// # Errors
/// Returns [`super::QueryError::UnknownField`] or
/// [`super::QueryError::InvalidPattern`] before any task is compared.
pub fn sort_tasks<T, I>(index: &Index, tasks: I, sorters: &[Sorter]) -> QueryResult<Vec<T>>
where
    T: Borrow<Task>,
    I: IntoIterator<Item = T>,
{
    let resolver = FieldResolver::new(index);
    let compiled = sorters
        .iter()
        .map(|sorter| {
            Ok(CompiledSorter {
                accessor: resolver.accessor(&sorter.field)?,
                extract: sorter
                    .filter
                    .as_deref()
                    .filter(|pattern| !pattern.is_empty())
                    .map(|pattern| compile_pattern(pattern, false))
                    .transpose()?,
                order: sorter.order,
            })
        })
        .collect::<QueryResult<Vec<_>>>()?;
    let collator = text_collator();

    let mut keyed: Vec<(Vec<SortKey>, T)> = tasks
        .into_iter()
        .map(|task| {
            let keys = compiled
                .iter()
                .map(|sorter| sorter.key(&resolver, task.borrow()))
                .collect();
            (keys, task)
        })
        .collect();

    keyed.sort_by(|(left, _), (right, _)| {
        compiled
            .iter()
            .zip(left.iter().zip(right))
            .map(|(sorter, (a, b))| match sorter.order {
                SortOrder::Ascending => a.compare(b, collator.as_ref()),
                SortOrder::Descending => a.compare(b, collator.as_ref()).reverse(),
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Ok(keyed.into_iter().map(|(_, task)| task).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryError;
    use time::macros::datetime;

    fn tasks(names: &[&str]) -> Vec<Task> {
        names
            .iter()
            .map(|name| Task::new(*name, datetime!(2024-01-01 00:00:00 UTC)))
            .collect()
    }

    fn sorted(index: &Index, tasks: &[Task], sorters: &[Sorter]) -> Vec<String> {
        sort_tasks(index, tasks, sorters)
            .unwrap_or_else(|err| panic!("sort must succeed: {err}"))
            .into_iter()
            .map(|task| task.id.clone())
            .collect()
    }

    fn sorter(field: &str, filter: Option<&str>, order: SortOrder) -> Sorter {
        Sorter {
            field: field.into(),
            filter: filter.map(str::to_owned),
            order,
        }
    }

    #[test]
    fn sorts_ids_both_ways() {
        let index = Index::new("P");
        let tasks = tasks(&["c-task-2", "a-task-3", "b-task-1"]);
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("id")]),
            vec!["a-task-3", "b-task-1", "c-task-2"]
        );
        assert_eq!(
            sorted(&index, &tasks, &[sorter("id", None, SortOrder::Descending)]),
            vec!["c-task-2", "b-task-1", "a-task-3"]
        );
    }

    #[test]
    fn extraction_pattern_orders_by_captured_digit() {
        let index = Index::new("P");
        let tasks = tasks(&["c-task-2", "a-task-3", "b-task-1"]);
        assert_eq!(
            sorted(
                &index,
                &tasks,
                &[sorter("id", Some(r"[abc]-task-(\d)"), SortOrder::Ascending)]
            ),
            vec!["b-task-1", "c-task-2", "a-task-3"]
        );
    }

    #[test]
    fn named_groups_are_concatenated_across_matches() {
        let pattern = Regex::new(r"(?<major>\d+)\.(?<minor>\d+)")
            .unwrap_or_else(|err| panic!("pattern must compile: {err}"));
        assert_eq!(extract(&pattern, "v1.2 and v3.4"), "1234");
        let whole = Regex::new(r"\d").unwrap_or_else(|err| panic!("pattern must compile: {err}"));
        assert_eq!(extract(&whole, "a1b2"), "12");
    }

    #[test]
    fn sort_is_stable_and_multi_key() {
        let index = Index::new("P");
        let mut tasks = tasks(&["Gamma", "Alpha", "Beta", "Delta"]);
        tasks[0].metadata.tags = vec!["Large".into()];
        tasks[2].metadata.tags = vec!["Large".into()];
        let by_workload = [sorter("workload", None, SortOrder::Descending)];
        assert_eq!(
            sorted(&index, &tasks, &by_workload),
            vec!["gamma", "beta", "alpha", "delta"]
        );

        let composite = [
            sorter("workload", None, SortOrder::Descending),
            Sorter::new("name"),
        ];
        assert_eq!(
            sorted(&index, &tasks, &composite),
            vec!["beta", "gamma", "alpha", "delta"]
        );
        assert_eq!(
            sorted(&index, &tasks, &[]),
            vec!["gamma", "alpha", "beta", "delta"]
        );
    }

    #[test]
    fn text_comparison_ignores_accents_and_case() {
        let index = Index::new("P");
        let tasks = tasks(&["Zulu", "éclair", "Apple", "Eagle"]);
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("name")]),
            vec!["apple", "eagle", "éclair", "zulu"]
        );
    }

    #[test]
    fn letters_without_decomposition_collate_in_place() {
        let index = Index::new("P");
        let tasks = tasks(&["Zebra", "Øresund", "Apple", "Straße", "Stop"]);
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("name")]),
            vec!["apple", "øresund", "stop", "straße", "zebra"]
        );
        let Some(collator) = text_collator() else {
            panic!("root collation data must load");
        };
        assert_eq!(collator.compare("Crème Brûlée", "creme brulee"), Ordering::Equal);
    }

    #[test]
    fn extracted_numbers_compare_as_text() {
        let mut index = Index::new("P");
        index.options.task_workload_tags =
            Some(std::collections::BTreeMap::from([("S".to_owned(), 9), ("L".to_owned(), 10)]));
        let mut tasks = tasks(&["Small", "Large"]);
        tasks[0].metadata.tags = vec!["S".into()];
        tasks[1].metadata.tags = vec!["L".into()];
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("workload")]),
            vec!["small", "large"]
        );
        assert_eq!(
            sorted(&index, &tasks, &[sorter("workload", Some(r"\d+"), SortOrder::Ascending)]),
            vec!["large", "small"]
        );
    }

    #[test]
    fn missing_values_sort_as_zero_or_empty() {
        let index = Index::new("P");
        let mut tasks = tasks(&["Late", "Undated", "Early"]);
        tasks[0].metadata.due = Some(datetime!(2024-03-01 00:00:00 UTC));
        tasks[2].metadata.due = Some(datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("due")]),
            vec!["undated", "early", "late"]
        );
        assert_eq!(
            sorted(&index, &tasks, &[Sorter::new("assigned")]),
            vec!["late", "undated", "early"]
        );
    }

    #[test]
    fn invalid_sorters_fail_up_front() {
        let index = Index::new("P");
        let tasks = tasks(&["One"]);
        assert!(matches!(
            sort_tasks(&index, &tasks, &[Sorter::new("nope")]),
            Err(QueryError::UnknownField(field)) if field == "nope"
        ));
        assert!(matches!(
            sort_tasks(&index, &tasks, &[sorter("name", Some("["), SortOrder::Ascending)]),
            Err(QueryError::InvalidPattern { .. })
        ));
    }
}
