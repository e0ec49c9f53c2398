use crate::color::TaskColor;
use crate::config::SuggestConfig;
use crate::model::{Day, Schedule, TaskDraft, TimeOfDay, CELL_MINUTES};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const ALL_DAY: &str = "All Day";

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    pub activities: Vec<String>,
    pub priorities: Vec<String>,
    pub time_constraints: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SuggestResponse {
    pub schedule: String,
}

#[derive(thiserror::Error, Debug)]
pub enum SuggestError {
    #[error("please enter at least one activity")]
    MissingActivities,
    #[error("please describe your time constraints")]
    MissingConstraints,
    #[error("no suggestion endpoint configured (set suggest.endpoint or WEEKGRID_SUGGEST_URL)")]
    NotConfigured,
    #[error("suggestion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("suggestion service answered with status {0}")]
    Status(u16),
}

pub trait Suggester {
    fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse, SuggestError>;
}

pub struct HttpSuggester {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpSuggester {
    pub fn from_config(config: &SuggestConfig) -> Result<Self, SuggestError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or(SuggestError::NotConfigured)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(HttpSuggester { client, endpoint })
    }
}

impl Suggester for HttpSuggester {
    fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse, SuggestError> {
        log::info!(
            "requesting suggestion for {} activities from {}",
            request.activities.len(),
            self.endpoint
        );
        let response = self.client.post(&self.endpoint).json(request).send()?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("suggestion endpoint returned {}", status);
            return Err(SuggestError::Status(status.as_u16()));
        }
        Ok(response.json()?)
    }
}

impl SuggestRequest {
    /// Builds a request from free-text form fields. Lists are split on
    /// commas and newlines.
    pub fn from_form(
        activities: &str,
        priorities: Option<&str>,
        time_constraints: &str,
    ) -> Result<Self, SuggestError> {
        let activities = split_list(activities);
        if activities.is_empty() {
            return Err(SuggestError::MissingActivities);
        }
        let time_constraints = time_constraints.trim();
        if time_constraints.is_empty() {
            return Err(SuggestError::MissingConstraints);
        }
        Ok(SuggestRequest {
            activities,
            priorities: priorities.map(split_list).unwrap_or_default(),
            time_constraints: time_constraints.to_string(),
        })
    }
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedItem {
    pub time: String,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    days: BTreeMap<Day, Vec<SuggestedItem>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyReport {
    pub added: Vec<String>,
    pub skipped: Vec<(SuggestedItem, String)>,
}

pub fn parse_suggestion(text: &str) -> Suggestion {
    let mut days: BTreeMap<Day, Vec<SuggestedItem>> =
        Day::ALL.iter().map(|d| (*d, Vec::new())).collect();
    let mut current: Option<Day> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(day) = day_header(line) {
            current = Some(day);
            continue;
        }
        let Some(day) = current else { continue };
        let Some(bullet) = line.strip_prefix('-') else {
            continue;
        };
        let bullet = bullet.trim();
        if bullet.is_empty() {
            continue;
        }
        let item = match bullet.split_once(" - ") {
            Some((time, activity)) => SuggestedItem {
                time: time.trim().to_string(),
                activity: activity.trim().to_string(),
            },
            None => SuggestedItem {
                time: ALL_DAY.to_string(),
                activity: bullet.to_string(),
            },
        };
        if let Some(items) = days.get_mut(&day) {
            items.push(item);
        }
    }
    Suggestion { days }
}

fn day_header(line: &str) -> Option<Day> {
    let stripped = line.trim_matches('*').trim();
    let name = stripped.strip_suffix(':')?.trim_matches('*').trim();
    Day::ALL
        .into_iter()
        .find(|d| d.name().eq_ignore_ascii_case(name))
}

/// Reads a clock time out of a suggestion bullet (`09:00 AM`, `9am`, `14:30`).
pub fn parse_clock(label: &str) -> Option<TimeOfDay> {
    let mut clock: String = label
        .to_ascii_uppercase()
        .replace('.', "")
        .split_whitespace()
        .collect();
    let meridiem = ["AM", "PM"].into_iter().find(|m| clock.ends_with(m));
    if meridiem.is_some() {
        clock.truncate(clock.len() - 2);
    }
    if !clock.contains(':') {
        clock.push_str(":00");
    }
    let parsed = match meridiem {
        Some(m) => NaiveTime::parse_from_str(&format!("{} {}", clock, m), "%I:%M %p"),
        None => NaiveTime::parse_from_str(&clock, "%H:%M"),
    };
    parsed
        .ok()
        .and_then(|t| TimeOfDay::from_hm(t.hour() as u16, t.minute() as u16))
}

impl Suggestion {
    pub fn items(&self, day: Day) -> &[SuggestedItem] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Day, &[SuggestedItem])> {
        self.days.iter().map(|(d, items)| (*d, items.as_slice()))
    }

    /// Adds every bullet with a clock time as a one-hour task. Vague times
    /// and bullets clashing with existing tasks are reported, not added.
    pub fn apply(&self, schedule: &mut Schedule, color: TaskColor) -> ApplyReport {
        let mut report = ApplyReport::default();
        for (day, items) in self.iter() {
            for item in items {
                let Some(start) = parse_clock(&item.time) else {
                    report
                        .skipped
                        .push((item.clone(), "no clock time".to_string()));
                    continue;
                };
                let end = start.plus_minutes(CELL_MINUTES);
                let draft = TaskDraft {
                    name: item.activity.clone(),
                    day,
                    start_time: start,
                    end_time: end,
                    color,
                };
                match schedule.create_task(draft) {
                    Ok(id) => report.added.push(id),
                    Err(err) => {
                        log::debug!("skipping suggested {:?} on {}: {}", item.activity, day, err);
                        report.skipped.push((item.clone(), err.to_string()));
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{draft, t};
    use std::cell::RefCell;

    struct Canned {
        text: &'static str,
        seen: RefCell<Vec<SuggestRequest>>,
    }

    impl Suggester for Canned {
        fn suggest(&self, request: &SuggestRequest) -> Result<SuggestResponse, SuggestError> {
            self.seen.borrow_mut().push(request.clone());
            Ok(SuggestResponse {
                schedule: self.text.to_string(),
            })
        }
    }

    fn item(time: &str, activity: &str) -> SuggestedItem {
        SuggestedItem {
            time: time.into(),
            activity: activity.into(),
        }
    }

    #[test]
    fn parses_headers_and_bullets() {
        let parsed = parse_suggestion("Monday:\n- 09:00 AM - Standup\nTuesday:\n- Gym");
        assert_eq!(parsed.items(Day::Monday), &[item("09:00 AM", "Standup")]);
        assert_eq!(parsed.items(Day::Tuesday), &[item(ALL_DAY, "Gym")]);
        for day in &Day::ALL[2..] {
            assert!(parsed.items(*day).is_empty());
        }
    }

    #[test]
    fn tolerates_noise_and_case() {
        let text = "Here is your plan\n- stray bullet\n**WEDNESDAY:**\n  - Evening - Read - chapter 3\n\nsunday:\n-\n- Morning - Hike";
        let parsed = parse_suggestion(text);
        assert_eq!(
            parsed.items(Day::Wednesday),
            &[item("Evening", "Read - chapter 3")]
        );
        assert_eq!(parsed.items(Day::Sunday), &[item("Morning", "Hike")]);
        assert!(parsed.items(Day::Monday).is_empty());
        assert!(!parsed.is_empty());
    }

    #[test]
    fn form_fields_are_split_and_validated() {
        let request =
            SuggestRequest::from_form("Team meeting, Code review\nGym,, ", None, " 9-5 ").unwrap();
        assert_eq!(request.activities, vec!["Team meeting", "Code review", "Gym"]);
        assert!(request.priorities.is_empty());
        assert_eq!(request.time_constraints, "9-5");

        assert!(matches!(
            SuggestRequest::from_form(" , ", None, "9-5"),
            Err(SuggestError::MissingActivities)
        ));
        assert!(matches!(
            SuggestRequest::from_form("Gym", Some("health"), "  "),
            Err(SuggestError::MissingConstraints)
        ));
    }

    #[test]
    fn clock_labels() {
        assert_eq!(parse_clock("09:00 AM"), Some(t("09:00")));
        assert_eq!(parse_clock("2:30 pm"), Some(t("14:30")));
        assert_eq!(parse_clock("9am"), Some(t("09:00")));
        assert_eq!(parse_clock("17:15"), Some(t("17:15")));
        assert_eq!(parse_clock("Morning"), None);
        assert_eq!(parse_clock(ALL_DAY), None);
    }

    #[test]
    fn apply_adds_timed_items_and_reports_the_rest() {
        let suggester = Canned {
            text: "Monday:\n- 09:00 AM - Standup\n- 09:30 AM - Clash\n- Morning - Walk\nFriday:\n- 11:30 PM - Late",
            seen: RefCell::new(Vec::new()),
        };
        let request = SuggestRequest::from_form("Standup", None, "weekdays").unwrap();
        let response = suggester.suggest(&request).unwrap();
        assert_eq!(suggester.seen.borrow().len(), 1);

        let mut schedule = Schedule::new("week");
        schedule
            .create_task(draft("Existing", Day::Friday, "08:00", "09:00"))
            .unwrap();
        let report = parse_suggestion(&response.schedule).apply(&mut schedule, TaskColor::DEFAULT);

        assert_eq!(report.added.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        let late = schedule.tasks.iter().find(|t| t.name == "Late").unwrap();
        assert_eq!(late.end_time, TimeOfDay::END_OF_DAY);
        assert!(schedule.tasks.iter().all(|t| t.name != "Clash"));
    }

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = SuggestRequest::from_form("Gym", Some("health"), "evenings").unwrap();
        let yaml = serde_yaml::to_string(&request).unwrap();
        assert!(yaml.contains("timeConstraints: evenings"));
    }
}
