//! Typed JSON persistence for all entity kinds.
//!
//! One file per kind under `.cadence/data/`, each holding a map from ID to
//! entity. Files are created empty on startup, written atomically under the
//! project lock, and quarantined when they fail to parse: reads of other
//! kinds continue, every mutation of the quarantined kind is refused until
//! operator intervention.

use crate::error::{CadenceError, Result};
use crate::io::{self, StateLock};
use crate::paths;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityKind {
    Stories,
    Tasks,
    Bugs,
    Sprints,
    Epics,
    Roadmaps,
}

impl EntityKind {
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Stories,
            EntityKind::Tasks,
            EntityKind::Bugs,
            EntityKind::Sprints,
            EntityKind::Epics,
            EntityKind::Roadmaps,
        ]
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            EntityKind::Stories => "stories",
            EntityKind::Tasks => "tasks",
            EntityKind::Bugs => "bugs",
            EntityKind::Sprints => "sprints",
            EntityKind::Epics => "epics",
            EntityKind::Roadmaps => "roadmaps",
        }
    }
}

// ---------------------------------------------------------------------------
// DataStore
// ---------------------------------------------------------------------------

pub struct DataStore {
    root: PathBuf,
    quarantined: Mutex<BTreeSet<EntityKind>>,
}

impl DataStore {
    /// Open the store, creating missing data files and probing each one.
    /// Unparseable files are quarantined rather than failing the open.
    pub fn open(root: &Path) -> Result<Self> {
        io::ensure_dir(&paths::data_dir(root))?;
        let store = Self {
            root: root.to_path_buf(),
            quarantined: Mutex::new(BTreeSet::new()),
        };
        for &kind in EntityKind::all() {
            io::write_if_missing(&store.file_path(kind), b"{}\n")?;
            if let Err(reason) = store.probe(kind) {
                tracing::warn!(
                    file = kind.file_stem(),
                    %reason,
                    "data file quarantined"
                );
                store.quarantine(kind);
            }
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, kind: EntityKind) -> PathBuf {
        paths::data_file(&self.root, kind.file_stem())
    }

    pub fn is_quarantined(&self, kind: EntityKind) -> bool {
        self.quarantined
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&kind)
    }

    fn quarantine(&self, kind: EntityKind) {
        self.quarantined
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind);
    }

    fn schema_error(&self, kind: EntityKind, reason: impl Into<String>) -> CadenceError {
        CadenceError::Schema {
            file: self.file_path(kind).display().to_string(),
            reason: reason.into(),
        }
    }

    /// Parse the file as a generic JSON map without committing to a schema.
    /// Anything else in `data/` (markdown, trailing garbage) is a schema error.
    fn probe(&self, kind: EntityKind) -> std::result::Result<(), String> {
        let raw = std::fs::read_to_string(self.file_path(kind)).map_err(|e| e.to_string())?;
        serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&raw)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    // -----------------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------------

    pub fn load<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<BTreeMap<String, T>> {
        if self.is_quarantined(kind) {
            return Err(self.schema_error(kind, "file is quarantined"));
        }
        let raw = std::fs::read_to_string(self.file_path(kind))?;
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                self.quarantine(kind);
                Err(self.schema_error(kind, e.to_string()))
            }
        }
    }

    pub fn save<T: Serialize>(&self, kind: EntityKind, map: &BTreeMap<String, T>) -> Result<()> {
        if self.is_quarantined(kind) {
            return Err(self.schema_error(kind, "file is quarantined"));
        }
        let _lock = StateLock::acquire(&paths::lock_path(&self.root))?;
        let mut data = serde_json::to_string_pretty(map)?;
        data.push('\n');
        io::atomic_write(&self.file_path(kind), data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// Copy every data file into a timestamped directory under `backups/`.
    /// Taken before destructive upgrades. Returns the backup directory.
    pub fn backup(&self) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let dest = paths::backups_dir(&self.root).join(stamp);
        io::ensure_dir(&dest)?;
        for &kind in EntityKind::all() {
            let src = self.file_path(kind);
            if src.exists() {
                std::fs::copy(&src, dest.join(format!("{}.json", kind.file_stem())))?;
            }
        }
        Ok(dest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::Story;
    use crate::task::Task;
    use tempfile::TempDir;

    #[test]
    fn open_creates_all_data_files() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        for &kind in EntityKind::all() {
            assert!(store.file_path(kind).exists(), "{:?} missing", kind);
        }
    }

    #[test]
    fn load_empty_store_yields_empty_maps() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let stories: BTreeMap<String, Story> = store.load(EntityKind::Stories).unwrap();
        assert!(stories.is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let mut stories = BTreeMap::new();
        let story = Story::new("US-A1B2C3", "Login", "user", "to log in", "data");
        stories.insert(story.id.clone(), story);
        store.save(EntityKind::Stories, &stories).unwrap();

        let back: BTreeMap<String, Story> = store.load(EntityKind::Stories).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back["US-A1B2C3"].title, "Login");
    }

    #[test]
    fn reload_then_save_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let mut tasks = BTreeMap::new();
        for n in 0..3 {
            let task = Task::new(format!("TASK-00000{n}"), "US-A1B2C3", format!("task {n}"));
            tasks.insert(task.id.clone(), task);
        }
        store.save(EntityKind::Tasks, &tasks).unwrap();
        let first = std::fs::read(store.file_path(EntityKind::Tasks)).unwrap();

        let reloaded: BTreeMap<String, Task> = store.load(EntityKind::Tasks).unwrap();
        store.save(EntityKind::Tasks, &reloaded).unwrap();
        let second = std::fs::read(store.file_path(EntityKind::Tasks)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_file_is_quarantined_but_others_survive() {
        let dir = TempDir::new().unwrap();
        {
            let store = DataStore::open(dir.path()).unwrap();
            let mut stories = BTreeMap::new();
            let story = Story::new("US-AAAAAA", "s", "r", "w", "b");
            stories.insert(story.id.clone(), story);
            store.save(EntityKind::Stories, &stories).unwrap();
        }

        // Corrupt tasks.json with a trailing byte and reopen.
        let tasks_path = paths::data_file(dir.path(), "tasks");
        let mut raw = std::fs::read(&tasks_path).unwrap();
        raw.push(b'x');
        std::fs::write(&tasks_path, &raw).unwrap();

        let store = DataStore::open(dir.path()).unwrap();
        assert!(store.is_quarantined(EntityKind::Tasks));

        // Reads of the healthy kind still work.
        let stories: BTreeMap<String, Story> = store.load(EntityKind::Stories).unwrap();
        assert_eq!(stories.len(), 1);

        // Every access to the quarantined kind is a schema error and the
        // corrupted bytes are left untouched.
        let err = store.load::<Task>(EntityKind::Tasks).unwrap_err();
        assert_eq!(err.kind(), "schema");
        let err = store.save(EntityKind::Tasks, &BTreeMap::<String, Task>::new()).unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert_eq!(std::fs::read(&tasks_path).unwrap(), raw);
    }

    #[test]
    fn markdown_in_data_dir_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let _ = DataStore::open(dir.path()).unwrap();
        std::fs::write(
            paths::data_file(dir.path(), "bugs"),
            "# Bugs\n\nThis is not data.\n",
        )
        .unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        assert!(store.is_quarantined(EntityKind::Bugs));
    }

    #[test]
    fn backup_copies_data_files() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::open(dir.path()).unwrap();
        let dest = store.backup().unwrap();
        assert!(dest.join("stories.json").exists());
        assert!(dest.join("tasks.json").exists());
    }
}
