//! Storage backends for FileKit.
//!
//! The [`Backend`] trait is the whole contract the ingestion engine relies on: existence
//! checks, reads, create-if-absent and upsert writes from an async byte stream,
//! deletes, one-level listings and an atomic compare-and-swap for small metadata blobs
//! such as shard counters.
//!
//! # Implementations
//!
//! - **[`LocalBackend`]**: a sandboxed directory tree. Paths are confined to a
//!   canonicalized root, writes are atomic (unique temp file + `fsync` + rename/link),
//!   and orphaned temp files are purged on connect.
//! - **[`MemoryBackend`]**: a shared in-process map with fault injection, used by the
//!   engine's tests and handy for previews.
//!
//! # Example
//!
//! ```rust
//! use filekit_storage::{Backend, BackendConfig, LocalBackend, StorageError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("data");
//!     let backend = LocalBackend::builder().root(&root).create(true).connect().await?;
//!
//!     backend.write_upsert("docs/1/readme.txt", &b"v1"[..], &BackendConfig::new()).await?;
//!     backend.write_upsert("docs/1/readme.txt", &b"v2"[..], &BackendConfig::new()).await?;
//!     assert_eq!(backend.read("docs/1/readme.txt").await?, b"v2");
//!
//!     let listed = backend.list_entries("docs/1").await?;
//!     assert_eq!(listed.len(), 1);
//!     Ok(())
//! }
//! ```

mod backend;
mod builder;
mod error;
mod local;
mod maintenance;
mod memory;
mod security;

pub use backend::{
    Backend, BackendConfig, CONTENT_TYPE, Entry, EntryKind, join_key, validate_key,
};
pub use builder::LocalBackendBuilder;
pub use error::{StorageError, StorageErrorExt};
pub use local::LocalBackend;
pub use memory::{MemoryBackend, Operation, StoredBlob};
