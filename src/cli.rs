use crate::color::TaskColor;
use crate::model::{Day, Orientation, TimeOfDay};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "weekgrid", version, about = "Weekly schedule grid for the terminal")]
pub struct Cli {
    /// Schedule id or name (defaults to the most recently created)
    #[arg(long, short, global = true)]
    pub schedule: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new schedule
    New {
        /// Schedule name
        name: String,
    },
    /// List saved schedules, newest first
    List,
    /// Print the grid of a schedule
    Show,
    /// Add a task
    Add {
        /// Task name
        name: String,
        /// Weekday (full name or three-letter abbreviation)
        #[arg(long, short)]
        day: Day,
        /// Start time, HH:MM
        #[arg(long)]
        start: TimeOfDay,
        /// End time, HH:MM
        #[arg(long)]
        end: TimeOfDay,
        /// Colour (#rrggbb or a CSS colour name)
        #[arg(long)]
        color: Option<TaskColor>,
    },
    /// Edit an existing task
    Edit {
        /// Task id
        task_id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New weekday
        #[arg(long, short)]
        day: Option<Day>,
        /// New start time
        #[arg(long)]
        start: Option<TimeOfDay>,
        /// New end time
        #[arg(long)]
        end: Option<TimeOfDay>,
        /// New colour
        #[arg(long)]
        color: Option<TaskColor>,
    },
    /// Remove a task
    Remove {
        /// Task id
        task_id: String,
    },
    /// Add or remove an hour row
    Hour {
        #[command(subcommand)]
        action: HourAction,
    },
    /// Show or hide a weekday
    Day {
        /// Weekday to toggle
        day: Day,
    },
    /// Set the grid orientation (toggles when omitted)
    Layout {
        /// vertical or horizontal
        layout: Option<Orientation>,
    },
    /// Rename the schedule
    Rename {
        /// New name
        name: String,
    },
    /// Write the grid to a text file
    Export {
        /// Output path (defaults to "<schedule name>.txt")
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Ask the suggestion service for a weekly plan
    Suggest {
        /// Activities, separated by commas or newlines
        #[arg(long, short)]
        activities: String,
        /// Priorities, separated by commas or newlines
        #[arg(long, short)]
        priorities: Option<String>,
        /// Time constraints, free text
        #[arg(long, short = 'c')]
        constraints: String,
        /// Add the suggested timed items to the schedule
        #[arg(long)]
        apply: bool,
    },
    /// Delete a schedule
    Delete {
        /// Schedule id or name
        target: String,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum HourAction {
    /// Add an hour label, HH:MM
    Add { label: String },
    /// Remove an hour label, HH:MM
    Remove { label: String },
}
