//! The storage contract every FileKit backend implements.

use crate::error::StorageError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use tokio::io::AsyncRead;

/// Backend option injected by the engine on every write.
pub const CONTENT_TYPE: &str = "ContentType";

/// Backend-specific write options (option name to value).
pub type BackendConfig = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full key of the child (`prefix/name`).
    pub key: String,
    pub kind: EntryKind,
}

/// A pluggable blob store addressed by `/`-separated keys.
///
/// Keys are relative: they never start with `/` and never contain `..` segments.
/// Listing returns the immediate children of a prefix, so a key like
/// `uploads/3/a.png` makes `uploads/3` list one file and `uploads` list one directory.
///
/// Every method reports infrastructure failures (connectivity, permissions, quota) as
/// `Err`. Expected negative outcomes are values: `write_create` on an existing key and
/// `delete` on a missing key return `Ok(false)`.
pub trait Backend: Send + Sync + 'static {
    /// Short reference delivered to lifecycle observers, e.g. `local:/srv/blobs`.
    fn describe(&self) -> Cow<'static, str>;

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn read(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Writes `stream` under `key` only if nothing is stored there yet.
    ///
    /// Returns `Ok(false)` without touching the existing blob when the key is taken.
    fn write_create<R>(
        &self,
        key: &str,
        stream: R,
        config: &BackendConfig,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send
    where
        R: AsyncRead + Send + Unpin;

    /// Writes `stream` under `key`, replacing any existing blob.
    fn write_upsert<R>(
        &self,
        key: &str,
        stream: R,
        config: &BackendConfig,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send
    where
        R: AsyncRead + Send + Unpin;

    /// Removes `key`. Returns `Ok(false)` if it was not present.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Lists the immediate children of `prefix`. A missing prefix lists as empty.
    fn list_entries(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<Entry>, StorageError>> + Send;

    /// Atomically replaces the blob at `key` with `new` if its current content equals
    /// `expected` (`None` meaning "absent"). Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Joins key segments with `/`, skipping empty ones and stray separators.
#[must_use]
pub fn join_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut key = String::new();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment);
    }
    key
}

/// Validates a key lexically: non-empty, relative, no `.`/`..`/empty segments.
///
/// # Errors
/// Returns [`StorageError::InvalidKey`] or [`StorageError::PathTraversalAttempt`].
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey { message: "EMPTY".into(), context: None });
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::PathTraversalAttempt {
            message: key.to_owned().into(),
            context: Some("Keys must be relative and '/'-separated".into()),
        });
    }
    for segment in key.split('/') {
        match segment {
            "" => {
                return Err(StorageError::InvalidKey {
                    message: key.to_owned().into(),
                    context: Some("Empty key segment".into()),
                });
            },
            "." | ".." => {
                return Err(StorageError::PathTraversalAttempt {
                    message: key.to_owned().into(),
                    context: Some("Dot segments are not allowed in keys".into()),
                });
            },
            _ => {},
        }
    }
    Ok(())
}
