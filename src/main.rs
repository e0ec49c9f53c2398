mod cli;
mod color;
mod commands;
mod config;
mod grid;
mod interaction;
mod layout;
mod model;
mod storage;
mod suggest;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, OpenOptions};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    let config = config::Config::load()?;
    init_logging(&config, matches!(command, cli::Command::Tui))?;

    let schedule = args.schedule.as_deref();
    match command {
        cli::Command::New { name } => commands::new(&config, name),
        cli::Command::List => commands::list(&config),
        cli::Command::Show => commands::show(&config, schedule),
        cli::Command::Add {
            name,
            day,
            start,
            end,
            color,
        } => commands::add(&config, schedule, name, day, start, end, color),
        cli::Command::Edit {
            task_id,
            name,
            day,
            start,
            end,
            color,
        } => commands::edit(&config, schedule, task_id, name, day, start, end, color),
        cli::Command::Remove { task_id } => commands::remove(&config, schedule, task_id),
        cli::Command::Hour { action } => commands::hour(&config, schedule, action),
        cli::Command::Day { day } => commands::day(&config, schedule, day),
        cli::Command::Layout { layout } => commands::layout(&config, schedule, layout),
        cli::Command::Rename { name } => commands::rename(&config, schedule, name),
        cli::Command::Export { output } => commands::export(&config, schedule, output),
        cli::Command::Suggest {
            activities,
            priorities,
            constraints,
            apply,
        } => commands::suggest(&config, schedule, activities, priorities, constraints, apply),
        cli::Command::Delete { target } => commands::delete(&config, target),
        cli::Command::Tui => commands::tui(&config, schedule),
    }
}

/// `RUST_LOG` controls the filter (default `warn`). The TUI owns the
/// terminal, so in that mode records go to `weekgrid.log` in the data dir.
fn init_logging(config: &config::Config, tui: bool) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if tui {
        let store = storage::Store::open(config)?;
        let path = store.log_path();
        fs::create_dir_all(store.root())
            .with_context(|| format!("creating {:?}", store.root()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
