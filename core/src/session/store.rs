//! Storage port for session snapshots
//!
//! One opaque JSON payload per terminal id. The file backend writes each
//! payload to its own temp file and renames it over the target, so readers
//! never see a torn record.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{HudError, Result};

pub trait SessionStore: Send + Sync {
    fn read(&self, terminal_id: &str) -> Result<Option<String>>;
    fn write(&self, terminal_id: &str, payload: &str) -> Result<()>;
    fn remove(&self, terminal_id: &str) -> Result<()>;
}

/// In-process store, used by tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn get(&self, terminal_id: &str) -> Option<String> {
        self.records.lock().get(terminal_id).cloned()
    }
}

impl SessionStore for MemoryStore {
    fn read(&self, terminal_id: &str) -> Result<Option<String>> {
        Ok(self.get(terminal_id))
    }

    fn write(&self, terminal_id: &str, payload: &str) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(HudError::PersistenceFailure {
                operation: "write",
                message: "store is read-only".to_string(),
            });
        }
        self.records
            .lock()
            .insert(terminal_id.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, terminal_id: &str) -> Result<()> {
        self.records.lock().remove(terminal_id);
        Ok(())
    }
}

/// One `{terminal_id}.json` file per terminal under `dir`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/apex-hud/sessions`
    pub fn default_location() -> Self {
        Self::new(crate::config::get_data_dir().join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, terminal_id: &str) -> PathBuf {
        let safe: String = terminal_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SessionStore for FileStore {
    fn read(&self, terminal_id: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(terminal_id)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, terminal_id: &str, payload: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let final_path = self.path_for(terminal_id);
        let temp_path = final_path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        std::fs::write(&temp_path, payload)?;
        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, terminal_id: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(terminal_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("sessions"));

        assert_eq!(store.read("apex-os-terminal").unwrap(), None);
        store.write("apex-os-terminal", "{\"a\":1}").unwrap();
        assert_eq!(
            store.read("apex-os-terminal").unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.write("apex-os-terminal", "{\"a\":2}").unwrap();
        assert_eq!(
            store.read("apex-os-terminal").unwrap().as_deref(),
            Some("{\"a\":2}")
        );
        let leftovers = std::fs::read_dir(store.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);

        store.remove("apex-os-terminal").unwrap();
        store.remove("apex-os-terminal").unwrap();
        assert_eq!(store.read("apex-os-terminal").unwrap(), None);
    }

    #[test]
    fn test_concurrent_writers_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path()));

        let writers: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        store.write("apex-os-terminal", &format!("{{\"w\":{},\"i\":{}}}", n, i))?;
                    }
                    Ok::<_, HudError>(())
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap().unwrap();
        }

        let stored = store.read("apex-os-terminal").unwrap().unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&stored).is_ok());
    }

    #[test]
    fn test_path_is_sanitized() {
        let store = FileStore::new("/tmp/x");
        assert_eq!(
            store.path_for("../evil id"),
            PathBuf::from("/tmp/x/___evil_id.json")
        );
    }

    #[test]
    fn test_memory_store_failures() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.write("t", "{}").is_err());
        store.fail_writes(false);
        store.write("t", "{}").unwrap();
        assert_eq!(store.get("t").as_deref(), Some("{}"));
    }
}
