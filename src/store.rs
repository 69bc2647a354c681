//! Delta store for change detection between runs
//!
//! Schedules Direct exposes md5 hashes (and, for lineups, modified dates that
//! behave like hashes) so clients can skip records that have not changed
//! since the last run. The store keeps the previously seen hash per key,
//! answers "which of these changed?", and persists only when the caller
//! commits a successful run.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::StoreError;

/// A schedule hash key: station id plus the day the hash covers.
pub type ScheduleKey = (String, String);

fn diff_into<K: Clone + Eq + std::hash::Hash>(
    old: &mut HashMap<K, String>,
    new: &[(K, String)],
) -> Vec<K> {
    let mut changed = Vec::new();
    for (key, hash) in new {
        if old.get(key) != Some(hash) {
            old.insert(key.clone(), hash.clone());
            changed.push(key.clone());
        }
    }
    changed
}

/// Hash state shared by all store implementations.
pub trait HashStore {
    /// Return the lineup ids whose modified date changed, updating state.
    fn diff_lineups(&mut self, lineups: &[(String, String)]) -> Vec<String>;

    /// Return the (station, day) pairs whose schedule md5 changed.
    fn diff_schedules(&mut self, schedules: &[(ScheduleKey, String)]) -> Vec<ScheduleKey>;

    /// Return the program ids whose md5 changed.
    fn diff_programs(&mut self, programs: &[(String, String)]) -> Vec<String>;

    /// Persist the updated state. Call only after a successful run, so a
    /// failed export re-fetches the same records next time.
    fn save(&mut self) -> Result<(), StoreError>;
}

/// Store that never remembers anything: every record is always "changed" and
/// nothing is persisted. Used when no cache directory is configured.
#[derive(Debug, Default)]
pub struct NullStore;

impl HashStore for NullStore {
    fn diff_lineups(&mut self, lineups: &[(String, String)]) -> Vec<String> {
        lineups.iter().map(|(key, _)| key.clone()).collect()
    }

    fn diff_schedules(&mut self, schedules: &[(ScheduleKey, String)]) -> Vec<ScheduleKey> {
        schedules.iter().map(|(key, _)| key.clone()).collect()
    }

    fn diff_programs(&mut self, programs: &[(String, String)]) -> Vec<String> {
        programs.iter().map(|(key, _)| key.clone()).collect()
    }

    fn save(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// File-backed store: one JSON map per record kind under a cache directory.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    lineups: HashMap<String, String>,
    schedules: HashMap<ScheduleKey, String>,
    programs: HashMap<String, String>,
}

impl JsonStore {
    const LINEUPS_FILE: &'static str = "lineups.json";
    const SCHEDULES_FILE: &'static str = "schedules.json";
    const PROGRAMS_FILE: &'static str = "programs.json";

    /// Open (or initialize) a store under `dir`. Missing files mean a first
    /// run; everything diffs as changed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let lineups: HashMap<String, String> = load_json(&dir.join(Self::LINEUPS_FILE))?;
        // Tuple keys do not survive JSON object keys, so schedules are stored
        // as a flat list of (station, day, md5) rows.
        let schedule_rows: Vec<(String, String, String)> =
            load_json(&dir.join(Self::SCHEDULES_FILE))?;
        let programs: HashMap<String, String> = load_json(&dir.join(Self::PROGRAMS_FILE))?;

        let schedules = schedule_rows
            .into_iter()
            .map(|(station, day, md5)| ((station, day), md5))
            .collect();

        Ok(Self {
            dir,
            lineups,
            schedules,
            programs,
        })
    }
}

fn load_json<T: Default + serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

impl HashStore for JsonStore {
    fn diff_lineups(&mut self, lineups: &[(String, String)]) -> Vec<String> {
        let changed = diff_into(&mut self.lineups, lineups);
        debug!(changed = changed.len(), total = lineups.len(), "diffed lineups");
        changed
    }

    fn diff_schedules(&mut self, schedules: &[(ScheduleKey, String)]) -> Vec<ScheduleKey> {
        let changed = diff_into(&mut self.schedules, schedules);
        debug!(
            changed = changed.len(),
            total = schedules.len(),
            "diffed schedules"
        );
        changed
    }

    fn diff_programs(&mut self, programs: &[(String, String)]) -> Vec<String> {
        let changed = diff_into(&mut self.programs, programs);
        debug!(
            changed = changed.len(),
            total = programs.len(),
            "diffed programs"
        );
        changed
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let schedule_rows: Vec<(&str, &str, &str)> = self
            .schedules
            .iter()
            .map(|((station, day), md5)| (station.as_str(), day.as_str(), md5.as_str()))
            .collect();

        fs::write(
            self.dir.join(Self::LINEUPS_FILE),
            serde_json::to_vec(&self.lineups)?,
        )?;
        fs::write(
            self.dir.join(Self::SCHEDULES_FILE),
            serde_json::to_vec(&schedule_rows)?,
        )?;
        fs::write(
            self.dir.join(Self::PROGRAMS_FILE),
            serde_json::to_vec(&self.programs)?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn null_store_reports_everything_changed() {
        let mut store = NullStore;
        let changed = store.diff_programs(&pairs(&[("a", "1"), ("b", "2")]));
        assert_eq!(changed, vec!["a", "b"]);
        // And again: nothing is remembered.
        let changed = store.diff_programs(&pairs(&[("a", "1")]));
        assert_eq!(changed, vec!["a"]);
    }

    #[test]
    fn json_store_diffs_only_changed_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();

        let changed = store.diff_programs(&pairs(&[("a", "1"), ("b", "2")]));
        assert_eq!(changed, vec!["a", "b"]);

        // Same hash for a, new hash for b, new key c.
        let changed = store.diff_programs(&pairs(&[("a", "1"), ("b", "3"), ("c", "4")]));
        assert_eq!(changed, vec!["b", "c"]);
    }

    #[test]
    fn saved_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = JsonStore::open(dir.path()).unwrap();
        store.diff_lineups(&pairs(&[("USA-OTA-90001", "2024-01-01")]));
        store.diff_schedules(&[(
            ("11299".to_string(), "2024-01-01".to_string()),
            "abc".to_string(),
        )]);
        store.diff_programs(&pairs(&[("SH000001", "h1")]));
        store.save().unwrap();

        let mut store = JsonStore::open(dir.path()).unwrap();
        assert!(store
            .diff_lineups(&pairs(&[("USA-OTA-90001", "2024-01-01")]))
            .is_empty());
        assert!(store
            .diff_schedules(&[(
                ("11299".to_string(), "2024-01-01".to_string()),
                "abc".to_string(),
            )])
            .is_empty());
        assert!(store.diff_programs(&pairs(&[("SH000001", "h1")])).is_empty());
    }

    #[test]
    fn unsaved_state_is_discarded() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = JsonStore::open(dir.path()).unwrap();
        store.diff_programs(&pairs(&[("SH000001", "h1")]));
        // No save: a failed run must re-fetch next time.

        let mut store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(
            store.diff_programs(&pairs(&[("SH000001", "h1")])),
            vec!["SH000001"]
        );
    }
}
