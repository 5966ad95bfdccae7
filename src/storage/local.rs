//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Analyser configuration
//! └── results/
//!     └── {batch}-{branch}-{college}/
//!         └── sem{n}.json   # One AcquisitionResult per semester
//! ```
//!
//! Writes go to a temporary file first and are renamed into place, so a
//! reader never sees a half-written result.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::AcquisitionResult;
use crate::storage::{ResultKey, ResultStorage, WriteMetadata, WriteOptions};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::storage(format!("{key} is not a stored result: {e}"))),
            None => Ok(None),
        }
    }
}

/// `sem3.json` -> 3
fn semester_from_file_name(name: &str) -> Option<u8> {
    name.strip_prefix("sem")?
        .strip_suffix(".json")?
        .parse()
        .ok()
        .filter(|sem| (1..=8).contains(sem))
}

#[async_trait]
impl ResultStorage for LocalStorage {
    async fn save_result(
        &self,
        result: &AcquisitionResult,
        options: &WriteOptions,
    ) -> Result<WriteMetadata> {
        let key = ResultKey::for_range(&result.range);
        let path = key.path();

        if result.cancelled && !options.force {
            if let Some(stored) = self.read_json::<AcquisitionResult>(&path).await? {
                if !stored.cancelled {
                    log::warn!(
                        "Refusing to replace complete result for {} with a cancelled run",
                        key
                    );
                    return Ok(WriteMetadata {
                        key,
                        records: 0,
                        skipped: true,
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        self.write_json(&path, result).await?;
        log::info!("Stored {} records to {}", result.records.len(), path);

        Ok(WriteMetadata {
            key,
            records: result.records.len(),
            skipped: false,
            timestamp: Utc::now(),
        })
    }

    async fn load_result(&self, key: &ResultKey) -> Result<Option<AcquisitionResult>> {
        let result = self.read_json(&key.path()).await?;
        if result.is_none() {
            log::warn!("No stored result for {}", key);
        }
        Ok(result)
    }

    async fn list_semesters(&self, class: &str) -> Result<Vec<u8>> {
        let dir = self.path(&format!("results/{class}"));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut semesters = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(sem) = entry.file_name().to_str().and_then(semester_from_file_name) {
                semesters.push(sem);
            }
        }
        semesters.sort_unstable();
        Ok(semesters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchStatus, RegistrationRange, StudentRecord};
    use tempfile::TempDir;

    fn result(semester: u8, cancelled: bool) -> AcquisitionResult {
        let range = RegistrationRange::new(1, 2, semester, 24, "105", "107");
        let records = vec![
            StudentRecord::failed(24105107001, FetchStatus::NotFound, "none"),
            StudentRecord::failed(24105107002, FetchStatus::NetworkError, "timeout"),
        ];
        let result = AcquisitionResult::new(range, records, Utc::now(), 42);
        if cancelled {
            result.into_cancelled(vec![24105107002])
        } else {
            result
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        let key = ResultKey::new("24-105-107", 1);
        assert!(storage.load_result(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_result() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let original = result(3, false);
        let meta = storage
            .save_result(&original, &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(meta.records, 2);
        assert!(!meta.skipped);
        assert!(tmp.path().join("results/24-105-107/sem3.json").exists());

        let loaded = storage.load_result(&meta.key).await.unwrap().unwrap();
        assert_eq!(loaded.records, original.records);
        assert_eq!(loaded.counters, original.counters);
        assert_eq!(loaded.elapsed_ms, 42);
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_replace_complete_one() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .save_result(&result(2, false), &WriteOptions::default())
            .await
            .unwrap();
        let meta = storage
            .save_result(&result(2, true), &WriteOptions::default())
            .await
            .unwrap();
        assert!(meta.skipped);
        let stored = storage.load_result(&meta.key).await.unwrap().unwrap();
        assert!(!stored.cancelled);

        let forced = storage
            .save_result(&result(2, true), &WriteOptions { force: true })
            .await
            .unwrap();
        assert!(!forced.skipped);
        assert!(storage.load_result(&meta.key).await.unwrap().unwrap().cancelled);
    }

    #[tokio::test]
    async fn test_list_and_load_class() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        for sem in [3, 1, 2] {
            storage
                .save_result(&result(sem, false), &WriteOptions::default())
                .await
                .unwrap();
        }
        storage
            .write_bytes("results/24-105-107/notes.txt", b"x")
            .await
            .unwrap();

        assert_eq!(storage.list_semesters("24-105-107").await.unwrap(), vec![1, 2, 3]);
        assert!(storage.list_semesters("23-101-110").await.unwrap().is_empty());

        let class = storage.load_class("24-105-107").await.unwrap();
        let semesters: Vec<_> = class.iter().map(|r| r.range.semester).collect();
        assert_eq!(semesters, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .write_bytes("results/24-105-107/sem1.json", b"{not json")
            .await
            .unwrap();

        let err = storage
            .load_result(&ResultKey::new("24-105-107", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn test_semester_file_names() {
        assert_eq!(semester_from_file_name("sem4.json"), Some(4));
        assert_eq!(semester_from_file_name("sem9.json"), None);
        assert_eq!(semester_from_file_name("sem4.tmp"), None);
    }
}
