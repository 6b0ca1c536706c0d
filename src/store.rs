use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

use crate::error::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Participants,
    Teams,
    Waves,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Participants,
        Collection::Teams,
        Collection::Waves,
        Collection::Settings,
    ];

    /// Field that identifies a document for `find_one` / `upsert_field`.
    pub fn key_field(self) -> Option<&'static str> {
        match self {
            Collection::Participants => None,
            Collection::Teams => Some("team_id"),
            Collection::Waves => Some("wave_id"),
            Collection::Settings => Some("key"),
        }
    }
}

/// Persistent collaborator holding the event's documents.
///
/// Writes to a single collection are serialized by the implementation;
/// nothing coordinates across calls.
pub trait EventStore: Send + Sync {
    fn replace_all(&self, collection: Collection, items: Vec<Value>) -> Result<(), StoreError>;

    /// Replace several collections in one commit.
    fn replace_many(&self, batch: Vec<(Collection, Vec<Value>)>) -> Result<(), StoreError> {
        for (collection, items) in batch {
            self.replace_all(collection, items)?;
        }
        Ok(())
    }

    fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    fn find_one(&self, collection: Collection, key: &Value) -> Result<Option<Value>, StoreError>;

    /// Set the field at `path` on the document matching `key`. When no
    /// document matches, one is created if `create` is set. Returns whether
    /// a document was written.
    fn upsert_field(
        &self,
        collection: Collection,
        key: &Value,
        path: &[&str],
        value: Value,
        create: bool,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    participants: Vec<Value>,
    #[serde(default)]
    teams: Vec<Value>,
    #[serde(default)]
    waves: Vec<Value>,
    #[serde(default)]
    settings: Vec<Value>,
}

impl Snapshot {
    fn docs(&self, collection: Collection) -> &Vec<Value> {
        match collection {
            Collection::Participants => &self.participants,
            Collection::Teams => &self.teams,
            Collection::Waves => &self.waves,
            Collection::Settings => &self.settings,
        }
    }

    fn docs_mut(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Participants => &mut self.participants,
            Collection::Teams => &mut self.teams,
            Collection::Waves => &mut self.waves,
            Collection::Settings => &mut self.settings,
        }
    }
}

/// In-memory document store, optionally mirrored to a JSON file after
/// every write.
#[derive(Debug, Default)]
pub struct DocumentStore {
    inner: Mutex<Snapshot>,
    path: Option<PathBuf>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        DocumentStore::default()
    }

    /// Open a file-backed store, loading the snapshot if one exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = if path.is_file() {
            let data = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&data)?;
            info!(
                "Loaded event data from {} ({} participants, {} teams)",
                path.display(),
                snapshot.participants.len(),
                snapshot.teams.len()
            );
            snapshot
        } else {
            info!("No event data at {}, starting empty", path.display());
            Snapshot::default()
        };
        Ok(DocumentStore {
            inner: Mutex::new(snapshot),
            path: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_snapshot(path, snapshot)
    }

    /// Persist `staged` and only then make it the live snapshot. A failed
    /// write leaves memory as it was.
    fn commit(&self, guard: &mut MutexGuard<'_, Snapshot>, staged: Snapshot) -> Result<(), StoreError> {
        self.persist(&staged)?;
        **guard = staged;
        Ok(())
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let payload = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)?;
    debug!("Persisted event data to {}", path.display());
    Ok(())
}

fn matches_key(doc: &Value, field: &str, key: &Value) -> bool {
    doc.get(field) == Some(key)
}

/// Walk `path`, creating objects as needed, and set the leaf.
fn set_path(doc: &mut Value, path: &[&str], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        *doc = value;
        return;
    };
    let mut cursor = doc;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Some(map) = cursor.as_object_mut() else {
            return;
        };
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(Map::new());
    }
    if let Value::Object(map) = cursor {
        map.insert(leaf.to_string(), value);
    }
}

impl EventStore for DocumentStore {
    fn replace_all(&self, collection: Collection, items: Vec<Value>) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let mut staged = guard.clone();
        *staged.docs_mut(collection) = items;
        self.commit(&mut guard, staged)
    }

    fn replace_many(&self, batch: Vec<(Collection, Vec<Value>)>) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let mut staged = guard.clone();
        for (collection, items) in batch {
            *staged.docs_mut(collection) = items;
        }
        self.commit(&mut guard, staged)
    }

    fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.docs(collection).clone())
    }

    fn find_one(&self, collection: Collection, key: &Value) -> Result<Option<Value>, StoreError> {
        let Some(field) = collection.key_field() else {
            return Ok(None);
        };
        let guard = self.lock()?;
        Ok(guard
            .docs(collection)
            .iter()
            .find(|doc| matches_key(doc, field, key))
            .cloned())
    }

    fn upsert_field(
        &self,
        collection: Collection,
        key: &Value,
        path: &[&str],
        value: Value,
        create: bool,
    ) -> Result<bool, StoreError> {
        let Some(field) = collection.key_field() else {
            return Ok(false);
        };
        let mut guard = self.lock()?;
        let mut staged = guard.clone();
        let docs = staged.docs_mut(collection);
        match docs.iter().position(|doc| matches_key(doc, field, key)) {
            Some(idx) => set_path(&mut docs[idx], path, value),
            None if create => {
                let mut doc = Value::Object(Map::new());
                set_path(&mut doc, &[field], key.clone());
                set_path(&mut doc, path, value);
                docs.push(doc);
            }
            None => return Ok(false),
        }
        self.commit(&mut guard, staged)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_and_find() {
        let store = DocumentStore::in_memory();
        store
            .replace_all(Collection::Teams, vec![json!({"team_id": 1}), json!({"team_id": 2})])
            .unwrap();
        assert_eq!(store.find_all(Collection::Teams).unwrap().len(), 2);
        assert_eq!(
            store.find_one(Collection::Teams, &json!(2)).unwrap(),
            Some(json!({"team_id": 2}))
        );
        assert_eq!(store.find_one(Collection::Teams, &json!(3)).unwrap(), None);

        store.replace_all(Collection::Teams, vec![]).unwrap();
        assert!(store.find_all(Collection::Teams).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_nested_field_on_existing_doc() {
        let store = DocumentStore::in_memory();
        store
            .replace_all(Collection::Teams, vec![json!({"team_id": 1, "station_times": {}})])
            .unwrap();
        let written = store
            .upsert_field(
                Collection::Teams,
                &json!(1),
                &["station_times", "Ski 750m"],
                json!({"time_str": "03:00", "total_seconds": 180}),
                false,
            )
            .unwrap();
        assert!(written);
        let doc = store.find_one(Collection::Teams, &json!(1)).unwrap().unwrap();
        assert_eq!(doc["station_times"]["Ski 750m"]["total_seconds"], json!(180));
    }

    #[test]
    fn test_upsert_missing_doc_without_create_is_noop() {
        let store = DocumentStore::in_memory();
        let written = store
            .upsert_field(Collection::Teams, &json!(4), &["members"], json!([]), false)
            .unwrap();
        assert!(!written);
        assert!(store.find_all(Collection::Teams).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_creates_settings_doc() {
        let store = DocumentStore::in_memory();
        let key = json!("active");
        store
            .upsert_field(Collection::Settings, &key, &["active_wave_id"], json!(2), true)
            .unwrap();
        store
            .upsert_field(Collection::Settings, &key, &["active_station"], json!("Ski 750m"), true)
            .unwrap();
        let docs = store.find_all(Collection::Settings).unwrap();
        assert_eq!(docs, vec![json!({"key": "active", "active_wave_id": 2, "active_station": "Ski 750m"})]);
    }

    #[test]
    fn test_file_store_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("trio-tag-store-{}", std::process::id()));
        let path = dir.join("event.json");
        let _ = fs::remove_file(&path);

        let store = DocumentStore::open(path.clone()).unwrap();
        store
            .replace_many(vec![
                (Collection::Participants, vec![json!({"name": "Ana", "gender": "F"})]),
                (Collection::Waves, vec![json!({"wave_id": 1, "team_ids": [1]})]),
            ])
            .unwrap();
        drop(store);

        let reopened = DocumentStore::open(path.clone()).unwrap();
        assert_eq!(reopened.find_all(Collection::Participants).unwrap().len(), 1);
        assert!(reopened.find_one(Collection::Waves, &json!(1)).unwrap().is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        let blocker = std::env::temp_dir().join(format!("trio-tag-blocker-{}", std::process::id()));
        fs::write(&blocker, "not a directory").unwrap();
        let store = DocumentStore::open(blocker.join("event.json")).unwrap();

        assert!(store.replace_all(Collection::Teams, vec![json!({"team_id": 1})]).is_err());
        assert!(store.find_all(Collection::Teams).unwrap().is_empty());

        assert!(store
            .replace_many(vec![(Collection::Waves, vec![json!({"wave_id": 1, "team_ids": [1]})])])
            .is_err());
        assert!(store.find_all(Collection::Waves).unwrap().is_empty());

        assert!(store
            .upsert_field(Collection::Settings, &json!("active"), &["active_wave_id"], json!(1), true)
            .is_err());
        assert!(store.find_one(Collection::Settings, &json!("active")).unwrap().is_none());

        let _ = fs::remove_file(&blocker);
    }
}
