use crate::color::TaskColor;
use crate::interaction::DEFAULT_HOLD;
use crate::model::{default_hours, default_visible_days, Day, Orientation, Schedule, TimeOfDay};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUGGEST_URL_ENV: &str = "WEEKGRID_SUGGEST_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_dir: Option<PathBuf>,
    pub defaults: Defaults,
    pub theme: Theme,
    pub drag_hold_ms: u64,
    pub suggest: SuggestConfig,
}

/// Settings applied to newly created schedules and tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub hours: Vec<TimeOfDay>,
    pub visible_days: Vec<Day>,
    pub layout: Orientation,
    pub color: TaskColor,
}

/// Colours used when drawing the grid. Built once from the config file and
/// handed to the renderer; nothing mutates it afterwards.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct Theme {
    pub primary: TaskColor,
    pub background: TaskColor,
    pub accent: TaskColor,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_dir: None,
            defaults: Defaults::default(),
            theme: Theme::default(),
            drag_hold_ms: DEFAULT_HOLD.as_millis() as u64,
            suggest: SuggestConfig::default(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            hours: default_hours(),
            visible_days: default_visible_days(),
            layout: Orientation::Vertical,
            color: TaskColor::DEFAULT,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            primary: TaskColor::from_rgb(0x64, 0xb5, 0xf6),
            background: TaskColor::from_rgb(0xf5, 0xf5, 0xf5),
            accent: TaskColor::from_rgb(0xff, 0xeb, 0x3b),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        SuggestConfig {
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Reads `config.yml` from the platform config directory, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Config> {
        let path = match project_dirs() {
            Ok(dirs) => dirs.config_dir().join("config.yml"),
            Err(err) => {
                log::warn!("{:#}; using default configuration", err);
                return Ok(Config::default().with_env());
            }
        };
        Ok(Config::load_from(&path)?.with_env())
    }

    pub fn load_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config: Config =
            serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
        Ok(config)
    }

    fn with_env(mut self) -> Self {
        if let Ok(url) = env::var(SUGGEST_URL_ENV) {
            if !url.trim().is_empty() {
                self.suggest.endpoint = Some(url.trim().to_string());
            }
        }
        self
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn drag_hold(&self) -> Duration {
        Duration::from_millis(self.drag_hold_ms)
    }
}

impl Defaults {
    pub fn new_schedule(&self, name: impl Into<String>) -> Schedule {
        let mut schedule = Schedule::new(name);
        schedule.hours = self.hours.clone();
        schedule.visible_days = self.visible_days.clone();
        schedule.layout = self.layout;
        schedule.normalize();
        schedule
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "weekgrid").context("locating config and data directories")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::t;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config.drag_hold(), DEFAULT_HOLD);
        assert_eq!(config.theme, Theme::default());
        assert!(config.suggest.endpoint.is_none());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "drag_hold_ms: 300\n\
             defaults:\n  hours: ['10:00', '08:00', '08:00']\n  visible_days: [Sunday, Monday]\n\
             theme:\n  accent: tomato\n\
             suggest:\n  endpoint: http://localhost:3400/suggest\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.drag_hold(), Duration::from_millis(300));
        assert_eq!(config.theme.accent.rgb(), (255, 99, 71));
        assert_eq!(config.theme.primary, Theme::default().primary);
        assert_eq!(
            config.suggest.endpoint.as_deref(),
            Some("http://localhost:3400/suggest")
        );

        let schedule = config.defaults.new_schedule("From config");
        assert_eq!(schedule.hours, vec![t("08:00"), t("10:00")]);
        assert_eq!(schedule.visible_days, vec![Day::Monday, Day::Sunday]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "drag_hold_ms: [not a number\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
