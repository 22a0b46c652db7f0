//! Core trait abstractions for rigbridge.
//!
//! - [`StatusStore`]: where the status file contents live

use std::future::Future;

use crate::types::StatusError;

/// Backing storage for the status file.
///
/// Implementations hold the raw text of the file; encoding and decoding
/// happen in [`crate::SettingsTable`]. Every write replaces the whole
/// contents in a single call. No locking is implied: concurrent readers may
/// observe any interleaving the backend allows.
///
/// # Example
///
/// ```ignore
/// use rigbridge::{CsvFileStore, StatusStore};
///
/// let store = CsvFileStore::new("data/hardware_settings.csv");
/// store.seed_if_absent(defaults).await?;
/// let raw = store.read().await?;
/// ```
pub trait StatusStore: Clone + Send + Sync + 'static {
    /// Reads the full contents.
    fn read(&self) -> impl Future<Output = Result<String, StatusError>> + Send;

    /// Replaces the full contents.
    ///
    /// Missing parent directories are created first.
    fn replace(&self, contents: String) -> impl Future<Output = Result<(), StatusError>> + Send;

    /// Writes `contents` only if nothing is stored yet.
    ///
    /// Returns `true` if the contents were written, `false` if the store
    /// already held data.
    fn seed_if_absent(
        &self,
        contents: String,
    ) -> impl Future<Output = Result<bool, StatusError>> + Send;

    /// Human-readable location of the store, used in logs and health output.
    fn location(&self) -> String;
}
