//! CLI entry point for plaintrack.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plaintrack_app::{FileStore, ProjectConfig, ProjectService};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Task boards kept as plain Markdown files.
#[derive(Parser, Debug)]
#[command(
    name = "plaintrack",
    version,
    about = "plaintrack: a kanban board stored as an index file and one Markdown file per task"
)]
struct Cli {
    /// Project root holding the index and task directory (defaults to current).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the index and every task file, reporting all problems.
    Validate,

    /// List tasks matching field filters.
    Find {
        /// `field=value`; repeat a field to alternate patterns or span a range.
        #[arg(short = 'f', long = "filter")]
        filters: Vec<String>,
        /// `field[:asc|desc[:pattern]]`, applied in order.
        #[arg(short = 's', long = "sort")]
        sorters: Vec<String>,
    },

    /// Reorder the tasks of one column.
    Sort {
        column: String,
        /// `field[:asc|desc[:pattern]]`, applied in order.
        #[arg(short = 's', long = "sort")]
        sorters: Vec<String>,
        /// Store the sorters so later saves keep the column ordered.
        #[arg(long)]
        save: bool,
    },

    /// Move a task into another column.
    Move {
        task: String,
        column: String,
        /// Zero-based position in the target column (appends when omitted).
        #[arg(short = 'p', long)]
        position: Option<usize>,
    },

    /// Rename a task, changing its identifier.
    Rename { task: String, name: String },

    /// Summarize workload, progress and dates.
    Status {
        /// Include due-date information.
        #[arg(long)]
        due: bool,
        /// Sprint number, name, or `current` (`name:<name>` forces a name).
        #[arg(long)]
        sprint: Option<String>,
        /// Dates spanning a reporting period.
        #[arg(short = 'd', long = "date")]
        dates: Vec<String>,
    },

    /// Compute burndown series.
    Burndown {
        /// Sprint number, name, or `current` (`name:<name>` forces a name);
        /// repeat for several series.
        #[arg(long = "sprint")]
        sprints: Vec<String>,
        /// Dates spanning the series window.
        #[arg(short = 'd', long = "date")]
        dates: Vec<String>,
        /// Only tasks assigned to this person.
        #[arg(short = 'a', long)]
        assigned: Option<String>,
        /// Only tasks in these columns.
        #[arg(short = 'c', long = "column")]
        columns: Vec<String>,
        /// `auto`, `days`, `hours`, `minutes` or `seconds`.
        #[arg(long)]
        normalise: Option<String>,
    },
}

fn main() -> Result<()> {
    let Cli { root, cmd } = Cli::parse();
    install_tracing();

    let config = ProjectConfig::from_workdir(&root)?;
    let store = FileStore::new(&root, &config);
    let service = ProjectService::new(store, config);
    commands::run(cmd, &service)
}

fn install_tracing() {
    // RUST_LOG overrides the INFO default; stdout is reserved for JSON.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
