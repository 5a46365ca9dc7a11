use serde::Serialize;
use time::OffsetDateTime;

use super::{AnalyticsError, AnalyticsResult};
use crate::model::{IndexOptions, Sprint};
use crate::timestamp::{delta_millis, format_timestamp, start_of_day, start_of_next_day};

/// How a sprint is picked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SprintSelector {
    /// The most recently started sprint.
    #[default]
    Current,
    /// 1-based sprint number.
    Number(usize),
    /// Exact sprint name.
    Name(String),
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    /// Inclusive start.
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    /// Exclusive end.
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl Window {
    /// True when `ts` falls inside the window.
    #[must_use]
    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Length in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        delta_millis(self.end, self.start)
    }

    /// Whole calendar days from the earliest to the latest of `dates`.
    ///
    /// # Errors
    /// Returns [`AnalyticsError::InvalidRange`] when `dates` is empty.
    pub fn from_dates(dates: &[OffsetDateTime]) -> AnalyticsResult<Self> {
        let (Some(min), Some(max)) = (dates.iter().min(), dates.iter().max()) else {
            return Err(AnalyticsError::InvalidRange("no dates given".to_owned()));
        };
        Ok(Self {
            start: start_of_day(*min),
            end: start_of_next_day(*max),
        })
    }
}

/// A sprint together with its number and time window.
#[derive(Debug, Clone, Copy)]
pub struct SelectedSprint<'a> {
    /// 1-based number.
    pub number: usize,
    /// The sprint record.
    pub sprint: &'a Sprint,
    /// `[start, next sprint start or now)`.
    pub window: Window,
}

/// Resolve `selector` against the configured sprints.
///
/// # Errors
/// Returns [`AnalyticsError::NoSprints`] when none are configured and
/// [`AnalyticsError::SprintNotFound`] when the selector matches nothing.
pub fn select_sprint<'a>(
    options: &'a IndexOptions,
    selector: &SprintSelector,
    now: OffsetDateTime,
) -> AnalyticsResult<SelectedSprint<'a>> {
    let sprints = &options.sprints;
    if sprints.is_empty() {
        return Err(AnalyticsError::NoSprints);
    }

    let position = match selector {
        SprintSelector::Current => sprints
            .iter()
            .rposition(|sprint| sprint.start <= now)
            .unwrap_or(sprints.len() - 1),
        SprintSelector::Number(number) => number
            .checked_sub(1)
            .filter(|idx| *idx < sprints.len())
            .ok_or_else(|| AnalyticsError::SprintNotFound(number.to_string()))?,
        SprintSelector::Name(name) => sprints
            .iter()
            .position(|sprint| sprint.name == *name)
            .ok_or_else(|| AnalyticsError::SprintNotFound(name.clone()))?,
    };

    let sprint = &sprints[position];
    let end = sprints
        .get(position + 1)
        .map_or(now, |next| next.start)
        .max(sprint.start);
    Ok(SelectedSprint {
        number: position + 1,
        sprint,
        window: Window {
            start: sprint.start,
            end,
        },
    })
}

pub(super) fn invalid_range(start: OffsetDateTime, end: OffsetDateTime) -> AnalyticsError {
    AnalyticsError::InvalidRange(format!(
        "{} is after {}",
        format_timestamp(start),
        format_timestamp(end)
    ))
}
