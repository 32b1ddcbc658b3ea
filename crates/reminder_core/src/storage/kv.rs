use crate::error::AppError;
use crate::storage::json_store::write_atomic;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Durable key-value store used by the background worker for its mirror.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError>;

    fn put(&mut self, key: &str, value: Value) -> Result<(), AppError>;
}

/// A single JSON object on disk, one property per key.
#[derive(Debug, Clone)]
pub struct JsonFileKvStore {
    path: PathBuf,
}

impl JsonFileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, AppError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|err| AppError::io(err.to_string()))?;
        match serde_json::from_str(&content)? {
            Value::Object(entries) => Ok(entries),
            _ => Err(AppError::invalid_data(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl KeyValueStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.read_all()?.remove(key))
    }

    fn put(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        // A corrupt file is replaced rather than blocking every later write.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value);
        let content = serde_json::to_string_pretty(&Value::Object(entries))?;
        write_atomic(&self.path, &content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: HashMap<String, Value>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonFileKvStore, KeyValueStore, MemoryKvStore};
    use serde_json::json;

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.json");

        let mut store = JsonFileKvStore::new(&path);
        store.put("incomplete_count", json!(3)).unwrap();
        store.put("reminder_schedule", json!([])).unwrap();

        let reopened = JsonFileKvStore::new(&path);
        assert_eq!(reopened.get("incomplete_count").unwrap(), Some(json!(3)));
        assert_eq!(reopened.get("reminder_schedule").unwrap(), Some(json!([])));
        assert_eq!(reopened.get("missing").unwrap(), None);
    }

    #[test]
    fn file_store_overwrites_corrupt_content_on_put() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.json");
        std::fs::write(&path, "not json").unwrap();

        let mut store = JsonFileKvStore::new(&path);
        assert!(store.get("incomplete_count").is_err());

        store.put("incomplete_count", json!(1)).unwrap();
        assert_eq!(store.get("incomplete_count").unwrap(), Some(json!(1)));
    }

    #[test]
    fn memory_store_replaces_values() {
        let mut store = MemoryKvStore::new();
        store.put("key", json!("a")).unwrap();
        store.put("key", json!("b")).unwrap();
        assert_eq!(store.get("key").unwrap(), Some(json!("b")));
    }
}
