//! Sandboxed filesystem backend.
//!
//! Keys map one-to-one onto paths below a canonicalized root directory. Writes never
//! expose partial content: data is streamed into a uniquely named sibling file, synced,
//! and then published with a rename (upsert) or a hard link (create-if-absent, which the
//! filesystem refuses atomically when the target already exists).

use crate::backend::{Backend, BackendConfig, Entry, EntryKind};
use crate::builder::LocalBackendBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::security;
use std::borrow::Cow;
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// The shared state behind a [`LocalBackend`] handle.
#[derive(Debug)]
pub struct LocalBackendInner {
    /// Canonicalized physical root; every resolved path starts with it.
    pub(crate) root: PathBuf,
    /// Source of unique suffixes for in-flight write files.
    pub(crate) tmp_counter: AtomicU64,
    /// Serializes compare-and-swap among handles sharing this backend.
    pub(crate) cas_lock: Mutex<()>,
}

/// A thread-safe handle to a directory tree used as a blob store.
///
/// Cloning is cheap; all clones share the same root and swap lock. The swap lock only
/// coordinates writers inside this process. Separate processes sharing one root still
/// get atomic `write_create`, but their counter swaps are not serialized.
///
/// Write options in [`BackendConfig`] are accepted and ignored: a plain directory has
/// nowhere to keep a content type.
///
/// # Example
///
/// ```rust
/// use filekit_storage::{Backend, BackendConfig, LocalBackend, StorageError};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), StorageError> {
/// # let tmp = tempfile::tempdir().unwrap();
/// let backend = LocalBackend::builder().root(tmp.path().join("blobs")).connect().await?;
///
/// assert!(backend.write_create("uploads/1/a.txt", &b"hello"[..], &BackendConfig::new()).await?);
/// assert!(!backend.write_create("uploads/1/a.txt", &b"again"[..], &BackendConfig::new()).await?);
/// assert_eq!(backend.read("uploads/1/a.txt").await?, b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    pub(crate) inner: Arc<LocalBackendInner>,
}

impl Deref for LocalBackend {
    type Target = LocalBackendInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl LocalBackend {
    #[must_use = "The backend is not initialized until you call .connect()"]
    pub fn builder() -> LocalBackendBuilder {
        LocalBackendBuilder::new()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to its physical path inside the sandbox.
    ///
    /// # Errors
    /// Returns [`StorageError::PathTraversalAttempt`] or [`StorageError::InvalidKey`]
    /// for keys that are malformed or would escape the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        security::resolve_key(&self.root, key)
    }

    /// Removes orphaned write files left behind by crashed writers.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root).await;
    }

    /// Streams `source` into a fresh sibling of `target` and syncs it to disk.
    async fn stage<R>(&self, target: &Path, mut source: R) -> Result<PathBuf, StorageError>
    where
        R: AsyncRead + Send + Unpin,
    {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directories for {}", target.display()))?;
        }

        let temp = self.tmp_path(target);
        let result = async {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("Temp creation failed: {}", temp.display()))?;
            tokio::io::copy(&mut source, &mut file).await.context("Streaming write failed")?;
            file.flush().await.context("Flush failed")?;
            file.sync_all().await.context("Hardware sync failed")
        }
        .await;

        if let Err(err) = result {
            discard(&temp).await;
            return Err(err);
        }
        Ok(temp)
    }

    async fn publish_replace(&self, temp: &Path, target: &Path) -> Result<(), StorageError> {
        match fs::rename(temp, target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                fs::remove_file(target)
                    .await
                    .context(format!("Failed to replace {}", target.display()))?;
                fs::rename(temp, target).await.context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    target.display()
                ))
            },
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), target.display())
                        .into(),
                ),
            }),
        }
    }

    async fn upsert_bytes(&self, target: &Path, data: &[u8]) -> Result<(), StorageError> {
        let temp = self.stage(target, data).await?;
        if let Err(err) = self.publish_replace(&temp, target).await {
            discard(&temp).await;
            return Err(err);
        }
        sync_parent(target).await;
        Ok(())
    }

    fn tmp_path(&self, target: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let name = target.file_name().and_then(|s| s.to_str()).unwrap_or("blob");
        target.with_file_name(format!("{name}{}{n}", maintenance::TMP_MARKER))
    }
}

impl Backend for LocalBackend {
    fn describe(&self) -> Cow<'static, str> {
        format!("local:{}", self.root.display()).into()
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Existence check failed: {}", path.display()).into()),
            }),
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound { message: key.to_owned().into(), context: None })
            },
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", path.display()).into()),
            }),
        }
    }

    async fn write_create<R>(
        &self,
        key: &str,
        stream: R,
        config: &BackendConfig,
    ) -> Result<bool, StorageError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let target = self.resolve(key)?;
        if fs::try_exists(&target).await.unwrap_or(false) {
            debug!(key, "Create refused: key already stored");
            return Ok(false);
        }
        trace!(key, options = config.len(), "Local backend ignores write options");

        let temp = self.stage(&target, stream).await?;
        let linked = fs::hard_link(&temp, &target).await;
        discard(&temp).await;

        match linked {
            Ok(()) => {
                sync_parent(&target).await;
                debug!(key, "Blob created");
                Ok(true)
            },
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(key, "Create lost the race: key already stored");
                Ok(false)
            },
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Publishing {} failed", target.display()).into()),
            }),
        }
    }

    async fn write_upsert<R>(
        &self,
        key: &str,
        stream: R,
        config: &BackendConfig,
    ) -> Result<bool, StorageError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let target = self.resolve(key)?;
        trace!(key, options = config.len(), "Local backend ignores write options");

        let temp = self.stage(&target, stream).await?;
        if let Err(err) = self.publish_replace(&temp, &target).await {
            discard(&temp).await;
            return Err(err);
        }
        sync_parent(&target).await;
        debug!(key, "Blob written");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Blob deleted");
                Ok(true)
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to delete: {}", path.display()).into()),
            }),
        }
    }

    async fn list_entries(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        let dir = if prefix.is_empty() { self.root.clone() } else { self.resolve(prefix)? };

        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(Vec::new());
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Listing failed: {}", dir.display()).into()),
                });
            },
        };

        let mut entries = Vec::new();
        while let Some(item) =
            reader.next_entry().await.context(format!("Listing failed: {}", dir.display()))?
        {
            let Ok(name) = item.file_name().into_string() else { continue };
            if maintenance::is_tmp_name(&name) {
                continue;
            }
            let file_type = item.file_type().await.context("Reading entry type failed")?;
            let kind = if file_type.is_dir() { EntryKind::Directory } else { EntryKind::File };
            let key = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            entries.push(Entry { key, kind });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StorageError> {
        let target = self.resolve(key)?;
        let _guard = self.cas_lock.lock().await;

        let current = match fs::read(&target).await {
            Ok(data) => Some(data),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Swap read failed: {}", target.display()).into()),
                });
            },
        };

        if current.as_deref() != expected {
            trace!(key, "Swap refused: value changed underneath");
            return Ok(false);
        }

        self.upsert_bytes(&target, new).await?;
        Ok(true)
    }
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await
        && err.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "Failed to remove write file");
    }
}

async fn sync_parent(path: &Path) {
    let Some(parent) = path.parent() else { return };
    match fs::File::open(parent).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %parent.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => warn!(path = %parent.display(), error = %err, "Directory open failed"),
    }
}
