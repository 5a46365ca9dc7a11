//! Field-based filtering and multi-key sorting of tasks.
//!
//! Both halves go through [`FieldResolver`], so any declared custom field is
//! filterable and sortable as soon as it is declared in the index options.

mod field;
mod filter;
mod sort;

pub use field::{FieldKind, FieldResolver, FieldValue};
pub use filter::{FilterValue, TaskFilter, filter_tasks};
pub use sort::{SortOrder, Sorter, sort_tasks};

/// Failures raised while evaluating filters and sorters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The field is neither built in nor a declared custom field.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// The column does not exist in the index.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    /// A filter or extraction pattern is not a valid regular expression.
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern {
        /// Pattern as supplied.
        pattern: String,
        /// Compiler message.
        message: String,
    },
    /// The filter value kind does not fit the field.
    #[error("field `{field}` expects a {expected} filter value")]
    TypeMismatch {
        /// Field being filtered.
        field: String,
        /// Kind the field holds.
        expected: FieldKind,
    },
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

fn compile_pattern(pattern: &str, case_insensitive: bool) -> QueryResult<regex::Regex> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|err| QueryError::InvalidPattern {
            pattern: pattern.to_owned(),
            message: err.to_string(),
        })
}
