//! [`StatusStore`] implementations.
//!
//! [`CsvFileStore`] is the production backend shared with the rig controller.
//! [`MemoryStatusStore`] keeps the contents in memory and counts reads, which
//! is useful for embedding and for tests.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::{codec::StatusRecord, traits::StatusStore, types::StatusError};

/// Seeds `store` with the default status record if it holds nothing yet.
///
/// Returns `true` if the defaults were written.
pub async fn seed_defaults<S: StatusStore>(store: &S) -> Result<bool, StatusError> {
    let seeded = store.seed_if_absent(StatusRecord::default().encode()).await?;
    if seeded {
        info!(location = %store.location(), "created status file with defaults");
    }
    Ok(seeded)
}

/// Status store backed by a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: Arc<PathBuf>,
}

impl CsvFileStore {
    /// Creates a store for the file at `path`.
    ///
    /// Nothing is touched on disk until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir).await,
            _ => Ok(()),
        }
    }
}

impl StatusStore for CsvFileStore {
    async fn read(&self) -> Result<String, StatusError> {
        Ok(tokio::fs::read_to_string(self.path.as_path()).await?)
    }

    async fn replace(&self, contents: String) -> Result<(), StatusError> {
        self.ensure_parent().await?;
        tokio::fs::write(self.path.as_path(), contents).await?;
        debug!(path = %self.path.display(), "status file replaced");
        Ok(())
    }

    async fn seed_if_absent(&self, contents: String) -> Result<bool, StatusError> {
        self.ensure_parent().await?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path.as_path())
            .await;

        match file {
            Ok(mut file) => {
                file.write_all(contents.as_bytes()).await?;
                file.flush().await?;
                debug!(path = %self.path.display(), "seeded status file with defaults");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory status store.
///
/// Clones share the same contents and read counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    contents: Arc<Mutex<Option<String>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryStatusStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `contents`.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self { contents: Arc::new(Mutex::new(Some(contents.into()))), reads: Arc::default() }
    }

    /// Returns the current contents without counting a read.
    pub fn snapshot(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Returns how many times [`StatusStore::read`] has been called.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a complete string.
        self.contents.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StatusStore for MemoryStatusStore {
    async fn read(&self) -> Result<String, StatusError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "status not written").into())
    }

    async fn replace(&self, contents: String) -> Result<(), StatusError> {
        *self.lock() = Some(contents);
        Ok(())
    }

    async fn seed_if_absent(&self, contents: String) -> Result<bool, StatusError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(false);
        }
        *guard = Some(contents);
        Ok(true)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_file_store_creates_directory_on_replace() {
        let dir = tempdir().unwrap();
        let store = CsvFileStore::new(dir.path().join("data").join("hardware_settings.csv"));

        store.replace("Setting,Value\n".to_string()).await.unwrap();

        assert!(store.path().exists());
        assert_eq!(store.read().await.unwrap(), "Setting,Value\n");
    }

    #[tokio::test]
    async fn test_file_store_seed_only_once() {
        let dir = tempdir().unwrap();
        let store = CsvFileStore::new(dir.path().join("data").join("hardware_settings.csv"));

        assert!(store.seed_if_absent("first\n".to_string()).await.unwrap());
        assert!(!store.seed_if_absent("second\n".to_string()).await.unwrap());
        assert_eq!(store.read().await.unwrap(), "first\n");
    }

    #[tokio::test]
    async fn test_file_store_replace_overwrites() {
        let dir = tempdir().unwrap();
        let store = CsvFileStore::new(dir.path().join("status.csv"));

        store.replace("a much longer first version\n".to_string()).await.unwrap();
        store.replace("short\n".to_string()).await.unwrap();

        assert_eq!(store.read().await.unwrap(), "short\n");
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let store = CsvFileStore::new(dir.path().join("absent.csv"));

        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StatusError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_memory_store_counts_reads() {
        let store = MemoryStatusStore::new();
        assert!(store.read().await.is_err());

        assert!(store.seed_if_absent("seed".to_string()).await.unwrap());
        assert!(!store.seed_if_absent("again".to_string()).await.unwrap());
        assert_eq!(store.read().await.unwrap(), "seed");

        let shared = store.clone();
        shared.replace("next".to_string()).await.unwrap();
        assert_eq!(store.snapshot().as_deref(), Some("next"));
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn test_seed_defaults_writes_default_record() {
        let dir = tempdir().unwrap();
        let store = CsvFileStore::new(dir.path().join("data").join("hardware_settings.csv"));

        assert!(seed_defaults(&store).await.unwrap());
        assert!(!seed_defaults(&store).await.unwrap());
        assert_eq!(store.read().await.unwrap(), StatusRecord::default().encode());
    }
}
