use anyhow::{Context, Result, bail};
use plaintrack_app::{ProjectService, ProjectStore, TaskFilterBuilder, parse_sorters};
use plaintrack_core::analytics::{BurndownOptions, Normalise, Resolution, SprintSelector, StatusOptions};
use plaintrack_core::timestamp::parse_timestamp;
use serde::Serialize;
use time::OffsetDateTime;

use crate::Command;

#[derive(Serialize)]
struct SortedColumn<'a> {
    column: &'a str,
    tasks: Vec<String>,
}

pub fn run<S: ProjectStore>(command: Command, service: &ProjectService<S>) -> Result<()> {
    let now = OffsetDateTime::now_utc();
    match command {
        Command::Validate => handle_validate(service),
        Command::Find { filters, sorters } => handle_find(service, &filters, &sorters),
        Command::Sort {
            column,
            sorters,
            save,
        } => {
            let sorters = parse_sorters(&sorters)?;
            let tasks = service.sort_column(&column, &sorters, save)?;
            print_json(&SortedColumn {
                column: &column,
                tasks,
            })
        }
        Command::Move {
            task,
            column,
            position,
        } => print_json(&service.move_task(&task, &column, position, now)?),
        Command::Rename { task, name } => print_json(&service.rename_task(&task, &name, now)?),
        Command::Status { due, sprint, dates } => {
            let options = StatusOptions {
                due,
                sprint: sprint.as_deref().map(parse_sprint),
                dates: parse_dates(&dates)?,
            };
            print_json(&service.status(&options, now)?)
        }
        Command::Burndown {
            sprints,
            dates,
            assigned,
            columns,
            normalise,
        } => {
            let options = BurndownOptions {
                sprints: sprints.iter().map(String::as_str).map(parse_sprint).collect(),
                dates: parse_dates(&dates)?,
                assigned,
                columns,
                normalise: normalise.as_deref().map(parse_normalise).transpose()?,
            };
            print_json(&service.burndown(&options, now)?)
        }
    }
}

fn handle_validate<S: ProjectStore>(service: &ProjectService<S>) -> Result<()> {
    let issues = service.validate()?;
    print_json(&issues)?;
    if !issues.is_empty() {
        bail!("{} validation issue(s) found", issues.len());
    }
    Ok(())
}

fn handle_find<S: ProjectStore>(
    service: &ProjectService<S>,
    filters: &[String],
    sorters: &[String],
) -> Result<()> {
    let index = service.load_index()?;
    let filter = TaskFilterBuilder::new().with_pairs(filters)?.build(&index)?;
    let sorters = parse_sorters(sorters)?;
    print_json(&service.find(&filter, &sorters)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// `current`, a 1-based number, or a name. `name:` forces a name lookup for
/// sprints called `current` or named like a number.
fn parse_sprint(raw: &str) -> SprintSelector {
    let trimmed = raw.trim();
    if let Some(name) = trimmed.strip_prefix("name:") {
        return SprintSelector::Name(name.trim().to_owned());
    }
    if trimmed.eq_ignore_ascii_case("current") {
        return SprintSelector::Current;
    }
    trimmed
        .parse::<usize>()
        .map_or_else(|_| SprintSelector::Name(trimmed.to_owned()), SprintSelector::Number)
}

fn parse_dates(raw: &[String]) -> Result<Vec<OffsetDateTime>> {
    raw.iter()
        .map(|value| parse_timestamp(value).with_context(|| format!("invalid date: {value}")))
        .collect()
}

fn parse_normalise(raw: &str) -> Result<Normalise> {
    let resolution = match raw.trim().to_ascii_lowercase().as_str() {
        "auto" => return Ok(Normalise::Auto),
        "days" | "day" => Resolution::Days,
        "hours" | "hour" => Resolution::Hours,
        "minutes" | "minute" => Resolution::Minutes,
        "seconds" | "second" => Resolution::Seconds,
        other => bail!("invalid normalise value: {other} (expected auto, days, hours, minutes or seconds)"),
    };
    Ok(Normalise::Fixed(resolution))
}
