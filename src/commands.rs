use crate::cli::HourAction;
use crate::color::TaskColor;
use crate::config::{Config, Theme};
use crate::grid::render_text;
use crate::model::{Day, Orientation, Schedule, TimeOfDay};
use crate::storage::{ScheduleEntry, Store};
use crate::suggest::{parse_suggestion, HttpSuggester, SuggestRequest, Suggester};
use crate::ui;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn new(config: &Config, name: String) -> Result<()> {
    let store = Store::open(config)?;
    let (entry, _) = store.create(&name)?;
    println!("Created schedule {} ({})", entry.name, entry.id);
    Ok(())
}

pub fn list(config: &Config) -> Result<()> {
    let store = Store::open(config)?;
    let entries = store.list()?;
    if entries.is_empty() {
        println!("No schedules yet. Create one with `weekgrid new <name>`.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{:<18} {:<30} {}",
            entry.id,
            entry.name,
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn show(config: &Config, selector: Option<&str>) -> Result<()> {
    let (_, _, schedule) = open(config, selector)?;
    print!("{}", render_text(&schedule, config.theme));
    for day in &schedule.visible_days {
        for task in schedule.tasks_on(*day) {
            println!(
                "  {} {}  {}-{}  {}",
                task.id,
                day.short(),
                task.start_time,
                task.end_time,
                task.name
            );
        }
    }
    Ok(())
}

pub fn add(
    config: &Config,
    selector: Option<&str>,
    name: String,
    day: Day,
    start: TimeOfDay,
    end: TimeOfDay,
    color: Option<TaskColor>,
) -> Result<()> {
    let color = color.unwrap_or(config.defaults.color);
    modify(config, selector, |schedule| {
        let draft = crate::model::TaskDraft {
            name: name.trim().to_string(),
            day,
            start_time: start,
            end_time: end,
            color,
        };
        let id = schedule.create_task(draft)?;
        Ok(format!("Added task {} on {} {}-{}", id, day, start, end))
    })
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    config: &Config,
    selector: Option<&str>,
    task_id: String,
    name: Option<String>,
    day: Option<Day>,
    start: Option<TimeOfDay>,
    end: Option<TimeOfDay>,
    color: Option<TaskColor>,
) -> Result<()> {
    modify(config, selector, |schedule| {
        let mut task = match schedule.task(&task_id) {
            Some(task) => task.clone(),
            None => bail!("task {} not found", task_id),
        };
        if let Some(name) = name {
            task.name = name.trim().to_string();
        }
        if let Some(day) = day {
            task.day = day;
        }
        if let Some(start) = start {
            task.start_time = start;
        }
        if let Some(end) = end {
            task.end_time = end;
        }
        if let Some(color) = color {
            task.color = color;
        }
        schedule
            .update_task(task)
            .with_context(|| format!("updating task {}", task_id))?;
        Ok(format!("Updated task {}", task_id))
    })
}

pub fn remove(config: &Config, selector: Option<&str>, task_id: String) -> Result<()> {
    modify(config, selector, |schedule| {
        if schedule.delete_task(&task_id) {
            Ok(format!("Removed task {}", task_id))
        } else {
            Ok(format!("No task {}; nothing removed", task_id))
        }
    })
}

pub fn hour(config: &Config, selector: Option<&str>, action: HourAction) -> Result<()> {
    modify(config, selector, |schedule| match action {
        HourAction::Add { label } => {
            let hour = schedule.add_hour(&label)?;
            Ok(format!("Added hour {}", hour))
        }
        HourAction::Remove { label } => {
            let hour = schedule.remove_hour(&label)?;
            Ok(format!("Removed hour {}", hour))
        }
    })
}

pub fn day(config: &Config, selector: Option<&str>, day: Day) -> Result<()> {
    modify(config, selector, |schedule| {
        let shown = schedule.toggle_day(day);
        Ok(format!(
            "{} is now {}",
            day,
            if shown { "visible" } else { "hidden" }
        ))
    })
}

pub fn layout(config: &Config, selector: Option<&str>, layout: Option<Orientation>) -> Result<()> {
    modify(config, selector, |schedule| {
        let layout = layout.unwrap_or_else(|| schedule.layout.toggled());
        schedule.set_layout(layout);
        Ok(format!("Layout set to {}", layout.label()))
    })
}

pub fn rename(config: &Config, selector: Option<&str>, name: String) -> Result<()> {
    modify(config, selector, |schedule| {
        let old = schedule.name.clone();
        schedule.rename(&name)?;
        Ok(format!("Renamed {} to {}", old, schedule.name))
    })
}

pub fn export(config: &Config, selector: Option<&str>, output: Option<PathBuf>) -> Result<()> {
    let (_, _, schedule) = open(config, selector)?;
    let path = output.unwrap_or_else(|| default_export_path(&schedule));
    write_export(&schedule, config.theme, &path)?;
    println!("Exported {} to {}", schedule.name, path.display());
    Ok(())
}

pub fn default_export_path(schedule: &Schedule) -> PathBuf {
    let stem: String = schedule
        .name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
        .collect();
    PathBuf::from(format!("{}.txt", stem.trim()))
}

pub fn write_export(schedule: &Schedule, theme: Theme, path: &Path) -> Result<()> {
    fs::write(path, render_text(schedule, theme))
        .with_context(|| format!("writing export to {:?}", path))
}

pub fn suggest(
    config: &Config,
    selector: Option<&str>,
    activities: String,
    priorities: Option<String>,
    constraints: String,
    apply: bool,
) -> Result<()> {
    let request = SuggestRequest::from_form(&activities, priorities.as_deref(), &constraints)?;
    let suggester = HttpSuggester::from_config(&config.suggest)?;
    let response = suggester.suggest(&request)?;
    let suggestion = parse_suggestion(&response.schedule);
    if suggestion.is_empty() {
        log::warn!("suggestion text had no recognizable days");
        println!("{}", response.schedule);
        bail!("the suggestion did not contain any weekday sections");
    }

    for (day, items) in suggestion.iter() {
        if items.is_empty() {
            continue;
        }
        println!("{}:", day);
        for item in items {
            println!("  - {} - {}", item.time, item.activity);
        }
    }

    if apply {
        let color = config.defaults.color;
        modify(config, selector, |schedule| {
            let report = suggestion.apply(schedule, color);
            for (item, reason) in &report.skipped {
                println!("Skipped \"{}\" ({}): {}", item.activity, item.time, reason);
            }
            Ok(format!(
                "Added {} suggested tasks, skipped {}",
                report.added.len(),
                report.skipped.len()
            ))
        })?;
    }
    Ok(())
}

pub fn delete(config: &Config, target: String) -> Result<()> {
    let store = Store::open(config)?;
    let entry = store.resolve(Some(&target))?;
    if !store.delete(&entry.id)? {
        bail!("schedule {} not found", target);
    }
    println!("Deleted schedule {} ({})", entry.name, entry.id);
    Ok(())
}

pub fn tui(config: &Config, selector: Option<&str>) -> Result<()> {
    let store = Store::open(config)?;
    let entry = if selector.is_none() && store.list()?.is_empty() {
        store.create(&crate::model::default_name())?.0
    } else {
        store.resolve(selector)?
    };
    let loaded = store.load(&entry)?;
    ui::run(config, store, entry, loaded)
}

fn open(config: &Config, selector: Option<&str>) -> Result<(Store, ScheduleEntry, Schedule)> {
    let store = Store::open(config)?;
    let entry = store.resolve(selector)?;
    let loaded = store.load(&entry)?;
    if let Some(notice) = &loaded.recovered {
        eprintln!("warning: {}", notice);
    }
    Ok((store, entry, loaded.schedule))
}

/// Loads the selected schedule, applies `change`, saves, and prints the
/// returned message. Nothing is written when `change` fails.
fn modify<F>(config: &Config, selector: Option<&str>, change: F) -> Result<()>
where
    F: FnOnce(&mut Schedule) -> Result<String>,
{
    let (store, entry, mut schedule) = open(config, selector)?;
    let message = change(&mut schedule)?;
    store.save(&entry.id, &schedule, None)?;
    println!("{}", message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config {
            storage_dir: Some(dir.path().join("data")),
            ..Config::default()
        }
    }

    fn load(config: &Config) -> Schedule {
        let (_, _, schedule) = open(config, None).unwrap();
        schedule
    }

    #[test]
    fn commands_edit_the_latest_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        new(&config, "Semester".into()).unwrap();
        let t = |s: &str| TimeOfDay::parse(s).unwrap();

        add(&config, None, "Lecture".into(), Day::Tuesday, t("10:00"), t("11:30"), None).unwrap();
        assert!(add(&config, None, "Clash".into(), Day::Tuesday, t("11:00"), t("12:00"), None).is_err());
        hour(&config, Some("semester"), HourAction::Add { label: "21:00".into() }).unwrap();
        day(&config, None, Day::Saturday).unwrap();
        layout(&config, None, None).unwrap();

        let schedule = load(&config);
        assert_eq!(schedule.tasks.len(), 1);
        assert_eq!(schedule.tasks[0].color, config.defaults.color);
        assert!(schedule.hours.contains(&t("21:00")));
        assert!(schedule.visible_days.contains(&Day::Saturday));
        assert_eq!(schedule.layout, Orientation::Horizontal);

        let id = schedule.tasks[0].id.clone();
        edit(&config, None, id.clone(), Some("Seminar".into()), None, None, Some(t("12:00")), None).unwrap();
        assert_eq!(load(&config).tasks[0].name, "Seminar");
        remove(&config, None, id.clone()).unwrap();
        assert!(load(&config).tasks.is_empty());
        remove(&config, None, id).unwrap();
        assert!(load(&config).tasks.is_empty());
    }

    #[test]
    fn export_writes_rendered_grid() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        new(&config, "Week/42".into()).unwrap();
        let t = |s: &str| TimeOfDay::parse(s).unwrap();
        add(&config, None, "Standup".into(), Day::Monday, t("09:00"), t("09:30"), None).unwrap();

        let schedule = load(&config);
        assert_eq!(default_export_path(&schedule), PathBuf::from("Week-42.txt"));

        let out = dir.path().join("week.txt");
        export(&config, None, Some(out.clone())).unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert!(text.contains("Standup"));
        assert!(text.contains("Monday"));
    }

    #[test]
    fn delete_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        new(&config, "Scratch".into()).unwrap();
        delete(&config, "scratch".into()).unwrap();
        assert!(delete(&config, "scratch".into()).is_err());
        assert!(show(&config, None).is_err());
    }
}
