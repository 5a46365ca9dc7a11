use std::borrow::Borrow;
use std::collections::BTreeMap;

use regex::Regex;
use time::OffsetDateTime;

use super::field::{Accessor, FieldKind, FieldResolver, FieldValue};
use super::{QueryError, QueryResult, compile_pattern};
use crate::model::{Index, Task};
use crate::timestamp::{start_of_day, start_of_next_day};

/// Predicate value for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Regular expressions, alternated.
    Text(Vec<String>),
    /// One exact value, or the inclusive range spanned by several.
    Number(Vec<f64>),
    /// One calendar day, or the inclusive day range spanned by several.
    Date(Vec<OffsetDateTime>),
    /// Exact flag.
    Boolean(bool),
}

/// Field-keyed conjunction of predicates.
///
/// Entries set to `None` impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    entries: BTreeMap<String, Option<FilterValue>>,
}

impl TaskFilter {
    /// Empty filter that matches every task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`TaskFilter::insert`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.insert(field, Some(value));
        self
    }

    /// Set or clear the predicate for `field`.
    pub fn insert(&mut self, field: impl Into<String>, value: Option<FilterValue>) -> &mut Self {
        self.entries.insert(field.into(), value);
        self
    }

    /// Present predicates in field order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries
            .iter()
            .filter_map(|(field, value)| value.as_ref().map(|value| (field.as_str(), value)))
    }

    /// True when no predicate is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

enum Predicate {
    Pattern(Regex),
    Number { min: f64, max: f64 },
    Date { start: OffsetDateTime, end: OffsetDateTime },
    Boolean(bool),
}

impl Predicate {
    fn compile(field: &str, kind: FieldKind, value: &FilterValue) -> QueryResult<Option<Self>> {
        let mismatch = || QueryError::TypeMismatch {
            field: field.to_owned(),
            expected: kind,
        };
        let predicate = match (kind, value) {
            (FieldKind::Text, FilterValue::Text(patterns)) => {
                if patterns.is_empty() {
                    return Ok(None);
                }
                let alternation = if patterns.len() == 1 {
                    patterns[0].clone()
                } else {
                    patterns
                        .iter()
                        .map(|pattern| format!("(?:{pattern})"))
                        .collect::<Vec<_>>()
                        .join("|")
                };
                Self::Pattern(compile_pattern(&alternation, true)?)
            }
            (FieldKind::Number, FilterValue::Number(values)) => {
                let Some((min, max)) = bounds(values.iter().copied(), f64::min, f64::max) else {
                    return Ok(None);
                };
                Self::Number { min, max }
            }
            (FieldKind::Date, FilterValue::Date(values)) => {
                let Some((min, max)) = bounds(values.iter().copied(), Ord::min, Ord::max) else {
                    return Ok(None);
                };
                Self::Date {
                    start: start_of_day(min),
                    end: start_of_next_day(max),
                }
            }
            (FieldKind::Boolean, FilterValue::Boolean(flag)) => Self::Boolean(*flag),
            _ => return Err(mismatch()),
        };
        Ok(Some(predicate))
    }

    fn matches(&self, value: Option<FieldValue>) -> bool {
        match (self, value) {
            (Self::Pattern(regex), Some(FieldValue::Text(text))) => regex.is_match(&text),
            (Self::Number { min, max }, Some(FieldValue::Number(number))) => {
                *min <= number && number <= *max
            }
            (Self::Date { start, end }, Some(FieldValue::Date(ts))) => *start <= ts && ts < *end,
            (Self::Boolean(expected), Some(FieldValue::Boolean(flag))) => *expected == flag,
            _ => false,
        }
    }
}

fn bounds<T: Copy>(
    mut values: impl Iterator<Item = T>,
    min: impl Fn(T, T) -> T,
    max: impl Fn(T, T) -> T,
) -> Option<(T, T)> {
    let first = values.next()?;
    Some(values.fold((first, first), |(lo, hi), value| (min(lo, value), max(hi, value))))
}

/// Keep the tasks matching every present predicate of `filter`, in input order.
///
/// # Errors
/// Returns [`QueryError::UnknownField`], [`QueryError::TypeMismatch`] or
/// [`QueryError::InvalidPattern`] before any task is evaluated.
pub fn filter_tasks<T, I>(index: &Index, tasks: I, filter: &TaskFilter) -> QueryResult<Vec<T>>
where
    T: Borrow<Task>,
    I: IntoIterator<Item = T>,
{
    let resolver = FieldResolver::new(index);
    let mut compiled: Vec<(Accessor<'_>, Predicate)> = Vec::new();
    for (field, value) in filter.entries() {
        let accessor = resolver.accessor(field)?;
        if let Some(predicate) = Predicate::compile(field, accessor.kind(), value)? {
            compiled.push((accessor, predicate));
        }
    }

    Ok(tasks
        .into_iter()
        .filter(|task| {
            compiled
                .iter()
                .all(|(accessor, predicate)| predicate.matches(resolver.read(*accessor, task.borrow())))
        })
        .collect())
}
