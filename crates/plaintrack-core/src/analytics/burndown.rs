use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;

use super::metrics::workload;
use super::window::{SprintSelector, Window, invalid_range, select_sprint};
use super::{AnalyticsResult, Tracked, tracked};
use crate::model::{Index, Task};
use crate::timestamp::{DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};

/// Time resolution samples are truncated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Midnight UTC.
    Days,
    /// Whole hours.
    Hours,
    /// Whole minutes.
    Minutes,
    /// Whole seconds.
    Seconds,
}

impl Resolution {
    /// Step length in milliseconds.
    #[must_use]
    pub const fn millis(self) -> i64 {
        match self {
            Self::Days => DAY_MS,
            Self::Hours => HOUR_MS,
            Self::Minutes => MINUTE_MS,
            Self::Seconds => SECOND_MS,
        }
    }

    /// Resolution fitting a window of `span_ms`: days from a week up, hours
    /// from a day, minutes from an hour, seconds below that.
    #[must_use]
    pub const fn for_span(span_ms: i64) -> Self {
        if span_ms >= 7 * DAY_MS {
            Self::Days
        } else if span_ms >= DAY_MS {
            Self::Hours
        } else if span_ms >= HOUR_MS {
            Self::Minutes
        } else {
            Self::Seconds
        }
    }

    fn truncate(self, ts: OffsetDateTime) -> OffsetDateTime {
        let step = i128::from(self.millis()) * 1_000_000;
        let nanos = ts.unix_timestamp_nanos();
        OffsetDateTime::from_unix_timestamp_nanos(nanos - nanos.rem_euclid(step)).unwrap_or(ts)
    }
}

/// Sample quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalise {
    /// Pick a resolution from the window length.
    Auto,
    /// Use this resolution.
    Fixed(Resolution),
}

impl Normalise {
    fn resolve(self, window: Window) -> Resolution {
        match self {
            Self::Auto => Resolution::for_span(window.duration_ms()),
            Self::Fixed(resolution) => resolution,
        }
    }
}

/// Burndown parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurndownOptions {
    /// One series per sprint. Takes precedence over `dates`.
    pub sprints: Vec<SprintSelector>,
    /// One series over the day range spanned by these dates.
    pub dates: Vec<OffsetDateTime>,
    /// Only tasks assigned to this person.
    pub assigned: Option<String>,
    /// Only tasks in these columns (all columns when empty).
    pub columns: Vec<String>,
    /// Optional quantization.
    pub normalise: Option<Normalise>,
}

/// Kind of task event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Task created.
    Created,
    /// Work started.
    Started,
    /// Task completed.
    Completed,
}

/// A task event at a sample timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurndownEvent {
    /// Task id.
    pub task: String,
    /// What happened.
    #[serde(rename = "eventType")]
    pub event: EventKind,
}

/// One sample of a burndown series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurndownPoint {
    /// Sample time.
    #[serde(with = "time::serde::rfc3339")]
    pub x: OffsetDateTime,
    /// Summed workload of active tasks.
    pub y: u32,
    /// Number of active tasks.
    pub count: usize,
    /// Events happening exactly at `x`.
    pub tasks: Vec<BurndownEvent>,
}

/// Samples over one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurndownSeries {
    /// Sprint name, for sprint windows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<String>,
    /// Sampled window (after quantization).
    #[serde(flatten)]
    pub window: Window,
    /// Applied resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Samples in ascending time order.
    pub points: Vec<BurndownPoint>,
}

struct Timeline<'t> {
    task: &'t Task,
    workload: u32,
    created: Option<OffsetDateTime>,
    started: Option<OffsetDateTime>,
    completed: Option<OffsetDateTime>,
}

impl Timeline<'_> {
    fn active_at(&self, ts: OffsetDateTime) -> bool {
        self.started.is_some_and(|started| started <= ts)
            && self.completed.is_none_or(|completed| completed > ts)
    }

    fn events(&self) -> [(EventKind, Option<OffsetDateTime>); 3] {
        [
            (EventKind::Created, self.created),
            (EventKind::Started, self.started),
            (EventKind::Completed, self.completed),
        ]
    }
}

/// Burndown series for the selected windows.
///
/// Without sprints or dates the current sprint is used when sprints exist,
/// otherwise the whole history from the earliest creation date to `now`.
///
/// # Errors
/// Returns sprint selection errors, and [`super::AnalyticsError::InvalidRange`]
/// for a sprint that has not started yet.
pub fn burndown(
    index: &Index,
    tasks: &[Task],
    options: &BurndownOptions,
    now: OffsetDateTime,
) -> AnalyticsResult<Vec<BurndownSeries>> {
    let selected: Vec<Tracked<'_>> = tracked(index, tasks)
        .into_iter()
        .filter(|entry| {
            options
                .assigned
                .as_deref()
                .is_none_or(|assignee| entry.task.metadata.assigned.as_deref() == Some(assignee))
        })
        .filter(|entry| {
            options.columns.is_empty()
                || options.columns.iter().any(|column| column == entry.column_name)
        })
        .collect();

    let mut windows: Vec<(Option<String>, Window)> = Vec::new();
    let sprint_selectors = if options.sprints.is_empty()
        && options.dates.is_empty()
        && !index.options.sprints.is_empty()
    {
        vec![SprintSelector::Current]
    } else {
        options.sprints.clone()
    };

    if !sprint_selectors.is_empty() {
        for selector in &sprint_selectors {
            let sprint = select_sprint(&index.options, selector, now)?;
            if sprint.sprint.start > now {
                return Err(invalid_range(sprint.sprint.start, now));
            }
            windows.push((Some(sprint.sprint.name.clone()), sprint.window));
        }
    } else if !options.dates.is_empty() {
        windows.push((None, Window::from_dates(&options.dates)?));
    } else {
        let start = selected
            .iter()
            .filter_map(|entry| entry.task.metadata.created)
            .min()
            .unwrap_or(now)
            .min(now);
        windows.push((None, Window { start, end: now }));
    }

    Ok(windows
        .into_iter()
        .map(|(sprint, window)| series(index, &selected, sprint, window, options.normalise))
        .collect())
}

fn series(
    index: &Index,
    selected: &[Tracked<'_>],
    sprint: Option<String>,
    window: Window,
    normalise: Option<Normalise>,
) -> BurndownSeries {
    let resolution = normalise.map(|normalise| normalise.resolve(window));
    let quantize = |ts: OffsetDateTime| resolution.map_or(ts, |res| res.truncate(ts));
    let window = Window {
        start: quantize(window.start),
        end: quantize(window.end),
    };

    let timelines: Vec<Timeline<'_>> = selected
        .iter()
        .map(|entry| Timeline {
            task: entry.task,
            workload: workload(entry.task, &index.options),
            created: entry.task.metadata.created.map(quantize),
            started: entry.task.metadata.started.map(quantize),
            completed: entry.task.metadata.completed.map(quantize),
        })
        .collect();

    let mut samples = BTreeSet::from([window.start, window.end]);
    for timeline in &timelines {
        samples.extend(
            timeline
                .events()
                .into_iter()
                .filter_map(|(_, ts)| ts)
                .filter(|ts| window.start < *ts && *ts < window.end),
        );
    }

    let points = samples
        .into_iter()
        .map(|x| {
            let active: Vec<&Timeline<'_>> =
                timelines.iter().filter(|timeline| timeline.active_at(x)).collect();
            let tasks = timelines
                .iter()
                .flat_map(|timeline| {
                    timeline
                        .events()
                        .into_iter()
                        .filter(move |(_, ts)| *ts == Some(x))
                        .map(move |(event, _)| BurndownEvent {
                            task: timeline.task.id.clone(),
                            event,
                        })
                })
                .collect();
            BurndownPoint {
                x,
                y: active
                    .iter()
                    .fold(0_u32, |total, timeline| total.saturating_add(timeline.workload)),
                count: active.len(),
                tasks,
            }
        })
        .collect();

    BurndownSeries {
        sprint,
        window,
        resolution,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsError;
    use crate::model::Sprint;
    use time::macros::datetime;

    fn task(name: &str, tags: &[&str], created: OffsetDateTime) -> Task {
        let mut task = Task::new(name, created);
        task.metadata.tags = tags.iter().map(|tag| (*tag).to_owned()).collect();
        task
    }

    fn project() -> (Index, Vec<Task>) {
        let mut index = Index::new("Board");
        let mut alpha = task("Alpha", &["Large"], datetime!(2024-01-01 09:00:00 UTC));
        alpha.metadata.started = Some(datetime!(2024-01-02 10:30:00 UTC));
        alpha.metadata.completed = Some(datetime!(2024-01-05 16:00:00 UTC));
        alpha.metadata.assigned = Some("ann".into());

        let mut beta = task("Beta", &["Small"], datetime!(2024-01-01 09:00:00 UTC));
        beta.metadata.started = Some(datetime!(2024-01-03 08:00:00 UTC));

        let gamma = task("Gamma", &[], datetime!(2024-01-04 12:00:00 UTC));

        index
            .add_task_to_column("alpha", "Done", None)
            .add_task_to_column("beta", "Doing", None)
            .add_task_to_column("gamma", "Todo", None);
        (index, vec![alpha, beta, gamma])
    }

    fn run(
        index: &Index,
        tasks: &[Task],
        options: &BurndownOptions,
        now: OffsetDateTime,
    ) -> Vec<BurndownSeries> {
        burndown(index, tasks, options, now).unwrap_or_else(|err| panic!("burndown: {err}"))
    }

    #[test]
    fn full_history_samples_every_event() {
        let (index, tasks) = project();
        let now = datetime!(2024-01-10 00:00:00 UTC);
        let series = run(&index, &tasks, &BurndownOptions::default(), now);
        assert_eq!(series.len(), 1);
        let points = &series[0].points;

        let xs: Vec<OffsetDateTime> = points.iter().map(|point| point.x).collect();
        assert_eq!(
            xs,
            vec![
                datetime!(2024-01-01 09:00:00 UTC),
                datetime!(2024-01-02 10:30:00 UTC),
                datetime!(2024-01-03 08:00:00 UTC),
                datetime!(2024-01-04 12:00:00 UTC),
                datetime!(2024-01-05 16:00:00 UTC),
                now,
            ]
        );
        let ys: Vec<(u32, usize)> = points.iter().map(|point| (point.y, point.count)).collect();
        assert_eq!(ys, vec![(0, 0), (5, 1), (7, 2), (7, 2), (2, 1), (2, 1)]);
        assert_eq!(
            points[0].tasks,
            vec![
                BurndownEvent {
                    task: "alpha".into(),
                    event: EventKind::Created
                },
                BurndownEvent {
                    task: "beta".into(),
                    event: EventKind::Created
                },
            ]
        );
    }

    #[test]
    fn huge_workloads_saturate_samples() {
        let mut index = Index::new("Board");
        index.options.task_workload_tags =
            Some(std::collections::BTreeMap::from([("Huge".to_owned(), u32::MAX)]));
        index
            .add_task_to_column("one", "Todo", None)
            .add_task_to_column("two", "Todo", None);
        let created = datetime!(2024-01-01 00:00:00 UTC);
        let tasks: Vec<Task> = ["One", "Two"]
            .into_iter()
            .map(|name| {
                let mut task = task(name, &["Huge"], created);
                task.metadata.started = Some(created);
                task
            })
            .collect();

        let series = run(
            &index,
            &tasks,
            &BurndownOptions::default(),
            datetime!(2024-01-02 00:00:00 UTC),
        );
        assert!(series[0].points.iter().all(|point| point.y == u32::MAX));
        assert_eq!(series[0].points.last().map(|point| point.count), Some(2));
    }

    #[test]
    fn auto_normalise_uses_days_for_long_windows() {
        let (index, tasks) = project();
        let now = datetime!(2024-01-10 00:00:00 UTC);
        let options = BurndownOptions {
            normalise: Some(Normalise::Auto),
            ..BurndownOptions::default()
        };
        let series = run(&index, &tasks, &options, now);
        assert_eq!(series[0].resolution, Some(Resolution::Days));
        assert!(
            series[0]
                .points
                .iter()
                .all(|point| point.x.time() == time::Time::MIDNIGHT)
        );
        assert_eq!(series[0].window.start, datetime!(2024-01-01 00:00:00 UTC));
    }

    #[test]
    fn auto_normalise_uses_seconds_for_short_windows() {
        let mut index = Index::new("Board");
        let mut quick = Task::new("Quick", datetime!(2024-01-01 00:00:00.250 UTC));
        quick.metadata.started = Some(datetime!(2024-01-01 00:10:00.750 UTC));
        index.add_task_to_column("quick", "Doing", None);
        let options = BurndownOptions {
            normalise: Some(Normalise::Auto),
            ..BurndownOptions::default()
        };
        let series = run(&index, &[quick], &options, datetime!(2024-01-01 00:30:00 UTC));
        assert_eq!(series[0].resolution, Some(Resolution::Seconds));
        assert_eq!(
            series[0].points.iter().map(|point| point.x).collect::<Vec<_>>(),
            vec![
                datetime!(2024-01-01 00:00:00 UTC),
                datetime!(2024-01-01 00:10:00 UTC),
                datetime!(2024-01-01 00:30:00 UTC),
            ]
        );
    }

    #[test]
    fn filters_narrow_the_task_set() {
        let (index, tasks) = project();
        let now = datetime!(2024-01-10 00:00:00 UTC);
        let by_assignee = run(
            &index,
            &tasks,
            &BurndownOptions {
                assigned: Some("ann".into()),
                ..BurndownOptions::default()
            },
            now,
        );
        assert!(by_assignee[0].points.iter().all(|point| point.y <= 5));

        let by_column = run(
            &index,
            &tasks,
            &BurndownOptions {
                columns: vec!["Doing".into()],
                ..BurndownOptions::default()
            },
            now,
        );
        assert_eq!(by_column[0].points.last().map(|point| point.y), Some(2));
    }

    #[test]
    fn sprint_windows_and_errors() {
        let (mut index, tasks) = project();
        index.options.sprints = vec![
            Sprint {
                name: "One".into(),
                description: String::new(),
                start: datetime!(2024-01-02 00:00:00 UTC),
            },
            Sprint {
                name: "Two".into(),
                description: String::new(),
                start: datetime!(2024-01-20 00:00:00 UTC),
            },
        ];
        let now = datetime!(2024-01-10 00:00:00 UTC);

        let current = run(&index, &tasks, &BurndownOptions::default(), now);
        assert_eq!(current[0].sprint.as_deref(), Some("One"));
        assert_eq!(current[0].window.end, datetime!(2024-01-20 00:00:00 UTC));

        let result = burndown(
            &index,
            &tasks,
            &BurndownOptions {
                sprints: vec![SprintSelector::Name("Two".into())],
                ..BurndownOptions::default()
            },
            now,
        );
        assert!(matches!(result, Err(AnalyticsError::InvalidRange(_))));
    }

    #[test]
    fn resolution_thresholds() {
        assert_eq!(Resolution::for_span(7 * DAY_MS), Resolution::Days);
        assert_eq!(Resolution::for_span(DAY_MS), Resolution::Hours);
        assert_eq!(Resolution::for_span(HOUR_MS), Resolution::Minutes);
        assert_eq!(Resolution::for_span(HOUR_MS - 1), Resolution::Seconds);
    }
}
