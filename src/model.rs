use crate::color::TaskColor;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;

/// Length of one grid cell window, in minutes.
pub const CELL_MINUTES: u16 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    pub fn short(self) -> &'static str {
        &self.name()[..3]
    }

    /// Case-insensitive match on the full name or the three-letter abbreviation.
    pub fn from_name(input: &str) -> Option<Day> {
        let needle = input.trim().to_ascii_lowercase();
        Day::ALL.into_iter().find(|day| {
            let name = day.name().to_ascii_lowercase();
            needle == name || needle == name[..3]
        })
    }

    pub fn from_weekday(weekday: chrono::Weekday) -> Day {
        Day::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::from_name(s).ok_or_else(|| ScheduleError::InvalidDay(s.trim().to_string()))
    }
}

/// Wall-clock time of day as minutes since midnight, `00:00..=24:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(24 * 60);

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 || hour > 24 || (hour == 24 && minute != 0) {
            return None;
        }
        Some(TimeOfDay(hour * 60 + minute))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// Strict `H:MM` / `HH:MM` parse.
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let raw = input.trim();
        let invalid = || ScheduleError::InvalidTime(raw.to_string());
        let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
        let digits = |s: &str, max_len: usize| {
            !s.is_empty() && s.len() <= max_len && s.chars().all(|c| c.is_ascii_digit())
        };
        if !digits(h, 2) || !digits(m, 2) || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::from_hm(hour, minute).ok_or_else(invalid)
    }

    /// Parse that never fails: anything unreadable is treated as midnight.
    pub fn parse_lenient(input: &str) -> Self {
        TimeOfDay::parse(input).unwrap_or_else(|_| {
            log::warn!("unreadable time {:?}, treating it as 00:00", input);
            TimeOfDay::MIDNIGHT
        })
    }

    /// Adds minutes, saturating at `24:00`.
    pub fn plus_minutes(self, minutes: u16) -> Self {
        TimeOfDay(self.0.saturating_add(minutes).min(Self::END_OF_DAY.0))
    }

    /// End of the grid cell starting at this label.
    pub fn next_increment(self) -> Self {
        self.plus_minutes(CELL_MINUTES)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeOfDay::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D>(deserializer: D) -> Result<TimeOfDay, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TimeOfDay::parse_lenient(&raw))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Days are columns, hours are rows.
    #[default]
    Vertical,
    /// Days are rows, hours are columns.
    Horizontal,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Vertical => Orientation::Horizontal,
            Orientation::Horizontal => Orientation::Vertical,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        }
    }
}

impl FromStr for Orientation {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(Orientation::Vertical),
            "horizontal" | "h" => Ok(Orientation::Horizontal),
            other => Err(ScheduleError::InvalidLayout(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub day: Day,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default)]
    pub color: TaskColor,
}

/// A task candidate that has not been given an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub name: String,
    pub day: Day,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub color: TaskColor,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "default_hours")]
    pub hours: Vec<TimeOfDay>,
    #[serde(default = "default_visible_days")]
    pub visible_days: Vec<Day>,
    #[serde(default)]
    pub layout: Orientation,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ScheduleError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("invalid time: {0} (use HH:MM)")]
    InvalidTime(String),
    #[error("end time {end} must be after start time {start}")]
    InvalidRange { start: TimeOfDay, end: TimeOfDay },
    #[error("unknown day: {0}")]
    InvalidDay(String),
    #[error("unknown layout: {0} (use vertical or horizontal)")]
    InvalidLayout(String),
    #[error("invalid colour: {0}")]
    InvalidColor(String),
    #[error("{day} {start}-{end} overlaps \"{existing}\"")]
    SlotConflict {
        day: Day,
        start: TimeOfDay,
        end: TimeOfDay,
        existing: String,
    },
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("invalid hour: {0} (use HH:MM before 24:00)")]
    InvalidHour(String),
    #[error("hour {0} is already on the grid")]
    DuplicateHour(TimeOfDay),
    #[error("hour {0} is not on the grid")]
    HourNotFound(TimeOfDay),
    #[error("cannot remove the last remaining hour")]
    LastHour,
}

pub fn default_name() -> String {
    "Untitled Schedule".to_string()
}

/// `06:00` through `20:00`, hourly.
pub fn default_hours() -> Vec<TimeOfDay> {
    (6..=20).filter_map(|h| TimeOfDay::from_hm(h, 0)).collect()
}

pub fn default_visible_days() -> Vec<Day> {
    Day::ALL[..5].to_vec()
}

pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

fn intervals_intersect(a: (TimeOfDay, TimeOfDay), b: (TimeOfDay, TimeOfDay)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

impl Task {
    pub fn new(id: TaskId, draft: TaskDraft) -> Self {
        Task {
            id,
            name: draft.name,
            day: draft.day,
            start_time: draft.start_time,
            end_time: draft.end_time,
            color: draft.color,
        }
    }

    pub fn interval(&self) -> (TimeOfDay, TimeOfDay) {
        (self.start_time, self.end_time)
    }

    pub fn overlaps(&self, other: &Task) -> bool {
        self.day == other.day && intervals_intersect(self.interval(), other.interval())
    }

    /// Whether this task occupies any part of the cell starting at `hour` on `day`.
    pub fn intersects_cell(&self, day: Day, hour: TimeOfDay) -> bool {
        self.day == day && intervals_intersect(self.interval(), (hour, hour.next_increment()))
    }

    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            name: self.name.clone(),
            day: self.day,
            start_time: self.start_time,
            end_time: self.end_time,
            color: self.color,
        }
    }
}

impl TaskDraft {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.name.trim().is_empty() {
            return Err(ScheduleError::EmptyName);
        }
        if self.end_time <= self.start_time {
            return Err(ScheduleError::InvalidRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }

    fn interval(&self) -> (TimeOfDay, TimeOfDay) {
        (self.start_time, self.end_time)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::new(default_name())
    }
}

impl Schedule {
    pub fn new(name: impl Into<String>) -> Self {
        Schedule {
            name: name.into(),
            tasks: Vec::new(),
            hours: default_hours(),
            visible_days: default_visible_days(),
            layout: Orientation::Vertical,
        }
    }

    /// Restores the ordering invariants on data that came from outside
    /// (sorted unique hours, canonical day order, at least one hour).
    pub fn normalize(&mut self) {
        self.hours.retain(|h| *h < TimeOfDay::END_OF_DAY);
        self.hours.sort();
        self.hours.dedup();
        if self.hours.is_empty() {
            self.hours = default_hours();
        }
        self.visible_days.sort();
        self.visible_days.dedup();
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn tasks_on(&self, day: Day) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.day == day).collect();
        tasks.sort_by_key(|t| (t.start_time, t.end_time));
        tasks
    }

    /// Tasks intersecting the cell window `[hour, hour + 1h)` on `day`.
    pub fn tasks_in_window(&self, day: Day, hour: TimeOfDay) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.intersects_cell(day, hour))
            .collect()
    }

    /// First task on `day` whose interval intersects `[start, end)`, ignoring `exclude`.
    pub fn find_conflict(
        &self,
        day: Day,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude: Option<&str>,
    ) -> Option<&Task> {
        self.tasks.iter().find(|t| {
            t.day == day
                && exclude.map_or(true, |id| t.id != id)
                && intervals_intersect(t.interval(), (start, end))
        })
    }

    fn ensure_free(&self, draft: &TaskDraft, exclude: Option<&str>) -> Result<(), ScheduleError> {
        match self.find_conflict(draft.day, draft.start_time, draft.end_time, exclude) {
            Some(existing) => Err(ScheduleError::SlotConflict {
                day: draft.day,
                start: draft.start_time,
                end: draft.end_time,
                existing: existing.name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn create_task(&mut self, draft: TaskDraft) -> Result<TaskId, ScheduleError> {
        draft.validate()?;
        self.ensure_free(&draft, None)?;
        let id = self.fresh_id();
        self.tasks.push(Task::new(id.clone(), draft));
        Ok(id)
    }

    /// Creates every draft or none of them.
    pub fn create_tasks(&mut self, drafts: Vec<TaskDraft>) -> Result<Vec<TaskId>, ScheduleError> {
        for (idx, draft) in drafts.iter().enumerate() {
            draft.validate()?;
            self.ensure_free(draft, None)?;
            if let Some(other) = drafts[..idx]
                .iter()
                .find(|o| o.day == draft.day && intervals_intersect(o.interval(), draft.interval()))
            {
                return Err(ScheduleError::SlotConflict {
                    day: draft.day,
                    start: draft.start_time,
                    end: draft.end_time,
                    existing: other.name.clone(),
                });
            }
        }
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = self.fresh_id();
            self.tasks.push(Task::new(id.clone(), draft));
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn update_task(&mut self, task: Task) -> Result<(), ScheduleError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == task.id)
            .ok_or_else(|| ScheduleError::TaskNotFound(task.id.clone()))?;
        let draft = task.to_draft();
        draft.validate()?;
        self.ensure_free(&draft, Some(&task.id))?;
        self.tasks[idx] = task;
        Ok(())
    }

    /// Returns whether a task was removed; unknown ids are not an error.
    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    pub fn add_hour(&mut self, label: &str) -> Result<TimeOfDay, ScheduleError> {
        let hour = TimeOfDay::parse(label)
            .ok()
            .filter(|h| *h < TimeOfDay::END_OF_DAY)
            .ok_or_else(|| ScheduleError::InvalidHour(label.trim().to_string()))?;
        if self.hours.contains(&hour) {
            return Err(ScheduleError::DuplicateHour(hour));
        }
        self.hours.push(hour);
        self.hours.sort();
        Ok(hour)
    }

    pub fn remove_hour(&mut self, label: &str) -> Result<TimeOfDay, ScheduleError> {
        let hour = TimeOfDay::parse(label)
            .map_err(|_| ScheduleError::InvalidHour(label.trim().to_string()))?;
        let idx = self
            .hours
            .iter()
            .position(|h| *h == hour)
            .ok_or(ScheduleError::HourNotFound(hour))?;
        if self.hours.len() <= 1 {
            return Err(ScheduleError::LastHour);
        }
        self.hours.remove(idx);
        Ok(hour)
    }

    /// Shows or hides `day`; returns whether it is now visible.
    pub fn toggle_day(&mut self, day: Day) -> bool {
        let visible = if let Some(idx) = self.visible_days.iter().position(|d| *d == day) {
            self.visible_days.remove(idx);
            false
        } else {
            self.visible_days.push(day);
            true
        };
        self.visible_days.sort();
        visible
    }

    pub fn set_layout(&mut self, layout: Orientation) {
        self.layout = layout;
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ScheduleError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::EmptyName);
        }
        self.name = trimmed.to_string();
        Ok(())
    }

    fn fresh_id(&self) -> TaskId {
        loop {
            let id = generate_id();
            if self.task(&id).is_none() {
                return id;
            }
        }
    }
}
