//! In-process backend for tests, previews and ephemeral deployments.

use crate::backend::{Backend, BackendConfig, Entry, EntryKind, validate_key};
use crate::error::{StorageError, StorageErrorExt};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Backend operations, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Exists,
    Read,
    Write,
    Delete,
    List,
    Swap,
}

/// A blob together with the options it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub config: BackendConfig,
}

#[derive(Debug, Default)]
struct MemoryState {
    blobs: BTreeMap<String, StoredBlob>,
    faults: Vec<(Operation, String)>,
}

/// A map-backed [`Backend`]. Clones share the same contents.
///
/// Faults can be injected per operation and key prefix to exercise error paths:
///
/// ```rust
/// use filekit_storage::{Backend, MemoryBackend, Operation};
///
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.inject_fault(Operation::Read, "private/");
/// assert!(backend.read("private/a.bin").await.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `op` on keys starting with `prefix` fail with
    /// [`StorageError::Unavailable`]. An empty prefix matches every key.
    pub fn inject_fault(&self, op: Operation, prefix: impl Into<String>) {
        self.state.write().faults.push((op, prefix.into()));
    }

    pub fn clear_faults(&self) {
        self.state.write().faults.clear();
    }

    /// Seeds a blob directly, bypassing faults.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        let blob = StoredBlob { data: data.into(), config: BackendConfig::new() };
        self.state.write().blobs.insert(key.into(), blob);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().blobs.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.state.read().blobs.get(key).cloned()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.read().blobs.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().blobs.len()
    }

    fn check(&self, op: Operation, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let state = self.state.read();
        if state.faults.iter().any(|(fault_op, prefix)| *fault_op == op && key.starts_with(prefix))
        {
            return Err(StorageError::Unavailable {
                message: format!("{op:?} {key}").into(),
                context: Some("Injected fault".into()),
            });
        }
        Ok(())
    }

    async fn drain<R>(mut stream: R) -> Result<Vec<u8>, StorageError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.context("Reading write stream failed")?;
        Ok(data)
    }
}

impl Backend for MemoryBackend {
    fn describe(&self) -> Cow<'static, str> {
        Cow::Borrowed("memory")
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check(Operation::Exists, key)?;
        Ok(self.contains(key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check(Operation::Read, key)?;
        self.get(key)
            .map(|blob| blob.data)
            .ok_or_else(|| StorageError::NotFound { message: key.to_owned().into(), context: None })
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
        self.check(Operation::Write, key)?;
        let data = Self::drain(stream).await?;

        let mut state = self.state.write();
        if state.blobs.contains_key(key) {
            debug!(key, "Create refused: key already stored");
            return Ok(false);
        }
        state.blobs.insert(key.to_owned(), StoredBlob { data, config: config.clone() });
        Ok(true)
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
        self.check(Operation::Write, key)?;
        let data = Self::drain(stream).await?;
        self.state.write().blobs.insert(key.to_owned(), StoredBlob { data, config: config.clone() });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.check(Operation::Delete, key)?;
        Ok(self.state.write().blobs.remove(key).is_some())
    }

    async fn list_entries(&self, prefix: &str) -> Result<Vec<Entry>, StorageError> {
        if !prefix.is_empty() {
            self.check(Operation::List, prefix)?;
        }
        let scope = if prefix.is_empty() { String::new() } else { format!("{prefix}/") };

        let state = self.state.read();
        let children: BTreeSet<(String, bool)> = state
            .blobs
            .range(scope.clone()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(&scope))
            .filter_map(|key| {
                let rest = &key[scope.len()..];
                match rest.split_once('/') {
                    Some((child, _)) => Some((child.to_owned(), true)),
                    None if rest.is_empty() => None,
                    None => Some((rest.to_owned(), false)),
                }
            })
            .collect();

        Ok(children
            .into_iter()
            .map(|(name, is_dir)| Entry {
                key: format!("{scope}{name}"),
                kind: if is_dir { EntryKind::Directory } else { EntryKind::File },
            })
            .collect())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StorageError> {
        self.check(Operation::Swap, key)?;

        let mut state = self.state.write();
        let current = state.blobs.get(key).map(|blob| blob.data.as_slice());
        if current != expected {
            return Ok(false);
        }
        state
            .blobs
            .insert(key.to_owned(), StoredBlob { data: new.to_vec(), config: BackendConfig::new() });
        Ok(true)
    }
}
