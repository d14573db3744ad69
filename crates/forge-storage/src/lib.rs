//! Storage backend abstraction for Forge Connector.
//!
//! The connector keeps three kinds of state: the connection settings record,
//! the synced content (posts, attachments, terms, users) and uploaded media
//! blobs. All of it goes through the [`StorageBackend`] trait, a plain
//! key-value interface that knows nothing about the records it holds.
//!
//! Two implementations are provided:
//!
//! - [`RedbBackend`]: persistent single-file store (feature `redb-backend`)
//! - [`MemoryBackend`]: in-memory, for tests and throwaway instances

mod error;
mod memory;
#[cfg(feature = "redb-backend")]
mod redb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;

/// A pluggable key-value storage backend.
///
/// Keys are UTF-8 strings using `/` as a separator (e.g. `sys/connection`,
/// `content/posts/0000000042`). Values are opaque byte arrays; the content
/// layer stores JSON documents and raw media bytes.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys that start with `prefix`, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Check whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Write several key-value pairs together.
    ///
    /// The default implementation writes them one by one. Backends with
    /// transactions override this so the batch lands atomically (an object
    /// record and the id sequence that allocated it, for example).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] or [`StorageError::Transaction`] if
    /// any write fails.
    async fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }
}
