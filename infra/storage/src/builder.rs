use crate::error::{StorageError, StorageErrorExt};
use crate::local::{LocalBackend, LocalBackendInner};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

/// Typestate builder for [`LocalBackend`]; `connect` exists only once a root is set.
#[allow(private_bounds)]
#[derive(Debug)]
pub struct LocalBackendBuilder<S: Sealed = NoRoot> {
    state: S,
    create: bool,
}

impl Default for LocalBackendBuilder<NoRoot> {
    fn default() -> Self {
        Self { state: NoRoot, create: true }
    }
}

#[allow(private_bounds)]
impl<S: Sealed> LocalBackendBuilder<S> {
    /// Whether a missing root directory is created on connect (default `true`).
    #[must_use = "Sets whether the root is created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.create = enable;
        self
    }
}

impl LocalBackendBuilder<NoRoot> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory of the backend"]
    pub fn root(self, path: impl Into<PathBuf>) -> LocalBackendBuilder<WithRoot> {
        LocalBackendBuilder { state: WithRoot(path.into()), create: self.create }
    }
}

impl LocalBackendBuilder<WithRoot> {
    /// Prepares the root directory and returns a ready backend.
    ///
    /// Boot sequence: create the root (if enabled), canonicalize it so symlinked
    /// roots cannot be used to escape the sandbox, then purge orphaned write files
    /// from earlier crashes. The purge is best-effort and only logs failures.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the root is missing while `create(false)` is
    /// set, or if it cannot be created or resolved.
    pub async fn connect(self) -> Result<LocalBackend, StorageError> {
        let root = self.state.0;

        if self.create {
            fs::create_dir_all(&root)
                .await
                .context(format!("Failed to bootstrap backend root: {}", root.display()))?;
        }

        let canonical = fs::canonicalize(&root)
            .await
            .context(format!("Failed to resolve backend root: {}", root.display()))?;
        info!(path = %canonical.display(), "Local storage backend ready");

        let backend = LocalBackend {
            inner: Arc::new(LocalBackendInner {
                root: canonical,
                tmp_counter: AtomicU64::new(1),
                cas_lock: Mutex::new(()),
            }),
        };

        backend.purge_tmp().await;

        Ok(backend)
    }
}
