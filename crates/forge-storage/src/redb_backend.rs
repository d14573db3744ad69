//! Persistent storage on a single redb file.
//!
//! redb is pure Rust, so the connector builds without a C toolchain. Every
//! call opens its own transaction on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::{StorageBackend, StorageError};

/// Every record lives in one table; namespacing is done with key prefixes.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// A storage backend backed by a redb database file.
///
/// # Examples
///
/// ```no_run
/// # use forge_storage::RedbBackend;
/// let backend = RedbBackend::open("/var/lib/forge/connector.redb").unwrap();
/// ```
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn txn_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

/// Run `op` inside a write transaction and commit it.
fn with_write<F>(db: &Database, op: F) -> Result<(), StorageError>
where
    F: FnOnce(&WriteTransaction) -> Result<(), StorageError>,
{
    let txn = db.begin_write().map_err(txn_error)?;
    op(&txn)?;
    txn.commit().map_err(txn_error)
}

/// Run a blocking closure on the Tokio blocking pool.
async fn blocking<T, F>(op: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| txn_error(format!("blocking task failed: {e}")))?
}

impl RedbBackend {
    /// Open the database at `path`, creating the file and table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the file cannot be opened or the
    /// records table cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let open_error = |e: &dyn std::fmt::Display| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let db = Database::create(path).map_err(|e| open_error(&e))?;
        with_write(&db, |txn| {
            txn.open_table(RECORDS).map_err(|e| open_error(&e))?;
            Ok(())
        })?;

        tracing::debug!(path = %path.display(), "opened redb storage");
        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Filesystem path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        blocking(move || {
            let read_error = |e: &dyn std::fmt::Display| StorageError::Read {
                key: key.clone(),
                reason: e.to_string(),
            };
            let txn = db.begin_read().map_err(|e| read_error(&e))?;
            let table = txn.open_table(RECORDS).map_err(|e| read_error(&e))?;
            let value = table.get(key.as_str()).map_err(|e| read_error(&e))?;
            Ok(value.map(|v| v.value().to_vec()))
        })
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.put_batch(&[(key.to_owned(), value.to_vec())]).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        blocking(move || {
            with_write(&db, |txn| {
                let delete_error = |e: &dyn std::fmt::Display| StorageError::Delete {
                    key: key.clone(),
                    reason: e.to_string(),
                };
                let mut table = txn.open_table(RECORDS).map_err(|e| delete_error(&e))?;
                table.remove(key.as_str()).map_err(|e| delete_error(&e))?;
                Ok(())
            })
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.to_owned();
        blocking(move || {
            let list_error = |e: &dyn std::fmt::Display| StorageError::List {
                prefix: prefix.clone(),
                reason: e.to_string(),
            };
            let txn = db.begin_read().map_err(|e| list_error(&e))?;
            let table = txn.open_table(RECORDS).map_err(|e| list_error(&e))?;

            let mut keys = Vec::new();
            for item in table.range(prefix.as_str()..).map_err(|e| list_error(&e))? {
                let (k, _) = item.map_err(|e| list_error(&e))?;
                let key = k.value();
                if !key.starts_with(prefix.as_str()) {
                    break;
                }
                keys.push(key.to_owned());
            }
            Ok(keys)
        })
        .await
    }

    async fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let entries = entries.to_vec();
        blocking(move || {
            with_write(&db, |txn| {
                let mut table = txn.open_table(RECORDS).map_err(txn_error)?;
                for (key, value) in &entries {
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(|e| StorageError::Write {
                            key: key.clone(),
                            reason: e.to_string(),
                        })?;
                }
                Ok(())
            })
        })
        .await
    }
}
