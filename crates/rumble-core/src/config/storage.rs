//! Key/value backends for binary config records

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::StorageError;

/// Persistent store addressed by opaque keys
pub trait ConfigStorage: Send {
    /// Fetch the record under `key`; [`StorageError::NotFound`] if absent
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace the record under `key`
    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

impl<S: ConfigStorage + ?Sized> ConfigStorage for Box<S> {
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        (**self).save(key, data)
    }
}

/// One `<key>.bin` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }
}

impl ConfigStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Written to a temp file first and renamed over the old record, so a
    /// crash mid-write leaves the previous record intact
    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        log::debug!("Saved {} bytes to {:?}", data.len(), path);
        Ok(())
    }
}

/// In-memory store; clones share contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Raw record under `key`, if any
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.records.lock().ok()?.get(key).cloned()
    }

    /// Store raw bytes without counting a write
    pub fn insert(&self, key: &str, data: &[u8]) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(key.to_string(), data.to_vec());
    }
}

impl ConfigStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(key).ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn save(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.insert(key, data);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("nested")).unwrap();

        assert!(matches!(storage.load("engine"), Err(StorageError::NotFound(_))));
        storage.save("engine", &[1, 2, 3]).unwrap();
        assert_eq!(storage.load("engine").unwrap(), vec![1, 2, 3]);
        storage.save("engine", &[4]).unwrap();
        assert_eq!(storage.load("engine").unwrap(), vec![4]);
        assert!(!storage.path_for("engine").with_extension("bin.tmp").exists());
    }

    #[test]
    fn test_memory_storage_counts_writes() {
        let storage = MemoryStorage::new();
        let mut writer = storage.clone();
        writer.save("a", &[9]).unwrap();
        writer.save("a", &[8]).unwrap();
        assert_eq!(storage.writes(), 2);
        assert_eq!(storage.load("a").unwrap(), vec![8]);
        assert!(matches!(storage.load("b"), Err(StorageError::NotFound(_))));
    }
}
