use plaintrack_core::timestamp::parse_timestamp;
use plaintrack_core::{FieldKind, FieldResolver, FilterValue, Index, QueryError, SortOrder, Sorter, TaskFilter};
use thiserror::Error;

/// Error type returned while constructing filters and sorters from user-facing inputs.
#[derive(Debug, Error)]
pub enum FilterBuildError {
    /// A `field=value` token without `=`.
    #[error("expected `field=value`, got `{token}`")]
    MalformedPair { token: String },
    /// The field cannot be resolved against the index.
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("invalid {field} number: {value}")]
    InvalidNumber { field: String, value: String },
    #[error("invalid {field} timestamp: {source}")]
    InvalidTimestamp {
        field: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("invalid {field} flag: {value} (expected true or false)")]
    InvalidBoolean { field: String, value: String },
    /// A sorter token whose direction is neither `asc` nor `desc`.
    #[error("invalid sort order `{token}` (expected asc or desc)")]
    InvalidSortOrder { token: String },
    #[error("empty sort field")]
    EmptySortField,
}

/// Result alias for filter construction helpers.
pub type FilterBuildResult<T> = Result<T, FilterBuildError>;

/// Builder that accepts raw `field=value` strings and types them against an index.
///
/// Repeated fields accumulate: several text values alternate, several numbers
/// or dates span a range, and the last boolean wins.
#[derive(Debug, Clone, Default)]
pub struct TaskFilterBuilder {
    values: Vec<(String, String)>,
}

impl TaskFilterBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one raw value for `field`.
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((field.into(), value.into()));
        self
    }

    /// Add `field=value` tokens.
    ///
    /// # Errors
    /// Returns an error for a token without `=`.
    pub fn with_pairs(mut self, pairs: &[String]) -> FilterBuildResult<Self> {
        for token in pairs {
            let (field, value) = token
                .split_once('=')
                .ok_or_else(|| FilterBuildError::MalformedPair { token: token.clone() })?;
            self.values.push((field.trim().to_owned(), value.to_owned()));
        }
        Ok(self)
    }

    /// Resolve every field against `index` and build the [`TaskFilter`].
    ///
    /// # Errors
    /// Returns an error for unknown fields and for values that do not parse
    /// as the field's kind.
    pub fn build(self, index: &Index) -> FilterBuildResult<TaskFilter> {
        let resolver = FieldResolver::new(index);
        let mut filter = TaskFilter::new();
        let mut pending: Vec<(String, FilterValue)> = Vec::new();

        for (field, raw) in self.values {
            let value = parse_value(&field, resolver.kind(&field)?, &raw)?;
            match pending.iter_mut().find(|(name, _)| *name == field) {
                Some((_, existing)) => merge(existing, value),
                None => pending.push((field, value)),
            }
        }

        for (field, value) in pending {
            filter.insert(field, Some(value));
        }
        Ok(filter)
    }
}

fn parse_value(field: &str, kind: FieldKind, raw: &str) -> FilterBuildResult<FilterValue> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::Text => Ok(FilterValue::Text(vec![raw.to_owned()])),
        FieldKind::Number => trimmed
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(|number| FilterValue::Number(vec![number]))
            .ok_or_else(|| FilterBuildError::InvalidNumber {
                field: field.to_owned(),
                value: raw.to_owned(),
            }),
        FieldKind::Date => parse_timestamp(trimmed)
            .map(|ts| FilterValue::Date(vec![ts]))
            .map_err(|source| FilterBuildError::InvalidTimestamp {
                field: field.to_owned(),
                source,
            }),
        FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(FilterValue::Boolean(true)),
            "false" | "no" | "0" => Ok(FilterValue::Boolean(false)),
            _ => Err(FilterBuildError::InvalidBoolean {
                field: field.to_owned(),
                value: raw.to_owned(),
            }),
        },
    }
}

fn merge(existing: &mut FilterValue, value: FilterValue) {
    match (existing, value) {
        (FilterValue::Text(current), FilterValue::Text(more)) => current.extend(more),
        (FilterValue::Number(current), FilterValue::Number(more)) => current.extend(more),
        (FilterValue::Date(current), FilterValue::Date(more)) => current.extend(more),
        (slot, value) => *slot = value,
    }
}

/// Parse sorter tokens of the form `field[:asc|desc[:pattern]]`.
///
/// The pattern is everything after the second colon, so it may itself
/// contain colons.
///
/// # Errors
/// Returns an error for an empty field or an unknown direction.
pub fn parse_sorters(tokens: &[String]) -> FilterBuildResult<Vec<Sorter>> {
    tokens.iter().map(|token| parse_sorter(token)).collect()
}

fn parse_sorter(token: &str) -> FilterBuildResult<Sorter> {
    let mut parts = token.splitn(3, ':');
    let field = parts.next().map(str::trim).unwrap_or_default();
    if field.is_empty() {
        return Err(FilterBuildError::EmptySortField);
    }

    let order = match parts.next().map(str::trim) {
        None | Some("" | "asc" | "ascending") => SortOrder::Ascending,
        Some("desc" | "descending") => SortOrder::Descending,
        Some(other) => {
            return Err(FilterBuildError::InvalidSortOrder {
                token: other.to_owned(),
            });
        }
    };

    Ok(Sorter {
        field: field.to_owned(),
        filter: parts.next().filter(|pattern| !pattern.is_empty()).map(str::to_owned),
        order,
    })
}
