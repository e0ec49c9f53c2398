use crate::config::Config;
use crate::model::{generate_id, Schedule};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub type ScheduleId = String;

/// One line of the schedule listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub name: String,
    #[serde(default)]
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

/// Result of loading a schedule record.
#[derive(Debug)]
pub struct Loaded {
    pub schedule: Schedule,
    /// Set when the stored record could not be used and defaults were substituted.
    pub recovered: Option<String>,
}

/// Local key-value store: `index.yml` plus one `schedules/<id>.yml` per schedule.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    defaults: crate::config::Defaults,
}

impl Store {
    pub fn open(config: &Config) -> Result<Store> {
        let root = config.data_dir()?;
        Ok(Store::at(root, config.defaults.clone()))
    }

    pub fn at(root: impl Into<PathBuf>, defaults: crate::config::Defaults) -> Store {
        Store {
            root: root.into(),
            defaults,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.yml")
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join("schedules").join(format!("{}.yml", id))
    }

    /// Entries sorted newest first. A corrupt index reads as empty.
    pub fn list(&self) -> Result<Vec<ScheduleEntry>> {
        let mut entries = self.read_index()?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    fn read_index(&self) -> Result<Vec<ScheduleEntry>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        match serde_yaml::from_str::<Option<Vec<ScheduleEntry>>>(&data) {
            Ok(entries) => Ok(entries.unwrap_or_default()),
            Err(err) => {
                log::warn!("schedule index {:?} is unreadable ({}), starting empty", path, err);
                Ok(Vec::new())
            }
        }
    }

    fn write_index(&self, entries: &[ScheduleEntry]) -> Result<()> {
        write_yaml(&self.index_path(), &entries)
    }

    pub fn create(&self, name: &str) -> Result<(ScheduleEntry, Schedule)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("schedule name must not be empty"));
        }
        let mut entries = self.read_index()?;
        let id = loop {
            let candidate = format!("schedule_{}", generate_id().to_ascii_lowercase());
            if !entries.iter().any(|e| e.id == candidate) {
                break candidate;
            }
        };
        let schedule = self.defaults.new_schedule(name);
        let entry = ScheduleEntry {
            id: id.clone(),
            name: name.to_string(),
            preview: String::new(),
            created_at: Utc::now(),
        };
        write_yaml(&self.record_path(&id), &schedule)?;
        entries.insert(0, entry.clone());
        self.write_index(&entries)?;
        log::debug!("created schedule {} ({})", entry.name, entry.id);
        Ok((entry, schedule))
    }

    /// Looks up a schedule by id, then by case-insensitive name; `None`
    /// picks the most recently created one.
    pub fn resolve(&self, selector: Option<&str>) -> Result<ScheduleEntry> {
        let entries = self.list()?;
        match selector.map(str::trim) {
            None | Some("") => entries
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no schedules yet (create one with `weekgrid new <name>`)")),
            Some(wanted) => {
                if let Some(entry) = entries.iter().find(|e| e.id == wanted) {
                    return Ok(entry.clone());
                }
                let lowered = wanted.to_lowercase();
                entries
                    .into_iter()
                    .find(|e| e.name.to_lowercase() == lowered)
                    .ok_or_else(|| anyhow!("schedule not found: {}", wanted))
            }
        }
    }

    pub fn load(&self, entry: &ScheduleEntry) -> Result<Loaded> {
        let path = self.record_path(&entry.id);
        if !path.exists() {
            log::warn!("record for {} missing, recreating with defaults", entry.id);
            return Ok(Loaded {
                schedule: self.defaults.new_schedule(entry.name.clone()),
                recovered: Some(format!(
                    "Schedule data for \"{}\" was missing; started from defaults",
                    entry.name
                )),
            });
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        match serde_yaml::from_str::<Schedule>(&data) {
            Ok(mut schedule) => {
                schedule.normalize();
                Ok(Loaded {
                    schedule,
                    recovered: None,
                })
            }
            Err(err) => {
                log::warn!("schedule record {:?} is corrupt: {}", path, err);
                Ok(Loaded {
                    schedule: self.defaults.new_schedule(entry.name.clone()),
                    recovered: Some(format!(
                        "Could not read \"{}\" ({}); started from defaults",
                        entry.name, err
                    )),
                })
            }
        }
    }

    /// Writes the record and refreshes the index entry's name (and preview, if given).
    pub fn save(&self, id: &str, schedule: &Schedule, preview: Option<String>) -> Result<()> {
        write_yaml(&self.record_path(id), schedule)?;
        let mut entries = self.read_index()?;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.name = schedule.name.clone();
                if let Some(preview) = preview {
                    entry.preview = preview;
                }
            }
            None => entries.push(ScheduleEntry {
                id: id.to_string(),
                name: schedule.name.clone(),
                preview: preview.unwrap_or_default(),
                created_at: Utc::now(),
            }),
        }
        self.write_index(&entries)?;
        log::debug!("saved schedule {} ({} tasks)", id, schedule.tasks.len());
        Ok(())
    }

    /// Removes the record and its index entry; returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.read_index()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let listed = entries.len() != before;
        if listed {
            self.write_index(&entries)?;
        }
        let path = self.record_path(id);
        let stored = path.exists();
        if stored {
            fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
        }
        Ok(listed || stored)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("weekgrid.log")
    }
}

fn write_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(value).context("serializing schedule data")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::model::tests::draft;
    use crate::model::Day;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path(), Defaults::default());
        (dir, store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let (entry, mut schedule) = store.create("Semester").unwrap();
        schedule
            .create_task(draft("Lecture", Day::Tuesday, "10:00", "11:30"))
            .unwrap();
        schedule.toggle_day(Day::Saturday);
        store.save(&entry.id, &schedule, None).unwrap();

        let loaded = store.load(&entry).unwrap();
        assert!(loaded.recovered.is_none());
        assert_eq!(loaded.schedule, schedule);
    }

    #[test]
    fn index_tracks_names_and_order() {
        let (_dir, store) = store();
        let (first, _) = store.create("First").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let (second, mut renamed) = store.create("Second").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(store.resolve(None).unwrap().id, second.id);
        assert_eq!(store.resolve(Some("first")).unwrap().id, first.id);
        assert_eq!(store.resolve(Some(&first.id)).unwrap().id, first.id);
        assert!(store.resolve(Some("third")).is_err());

        renamed.rename("Second, renamed").unwrap();
        store
            .save(&second.id, &renamed, Some("preview".into()))
            .unwrap();
        let entry = store.resolve(Some(&second.id)).unwrap();
        assert_eq!(entry.name, "Second, renamed");
        assert_eq!(entry.preview, "preview");
    }

    #[test]
    fn corrupt_record_recovers_with_defaults() {
        let (_dir, store) = store();
        let (entry, _) = store.create("Broken").unwrap();
        fs::write(store.record_path(&entry.id), "tasks: [{{{").unwrap();

        let loaded = store.load(&entry).unwrap();
        assert!(loaded.recovered.is_some());
        assert_eq!(loaded.schedule.name, "Broken");
        assert!(loaded.schedule.tasks.is_empty());
    }

    #[test]
    fn corrupt_index_reads_as_empty() {
        let (_dir, store) = store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.index_path(), "::: not yaml [").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_record_and_entry() {
        let (_dir, store) = store();
        let (entry, _) = store.create("Temp").unwrap();
        assert!(store.delete(&entry.id).unwrap());
        assert!(store.list().unwrap().is_empty());
        assert!(!store.record_path(&entry.id).exists());
        assert!(!store.delete(&entry.id).unwrap());
    }

    #[test]
    fn empty_name_is_rejected() {
        let (_dir, store) = store();
        assert!(store.create("   ").is_err());
    }
}
