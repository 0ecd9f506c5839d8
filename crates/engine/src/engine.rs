use crate::builder::{NoBackend, StorageEngineBuilder};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineErrorExt};
use crate::file::FileHandle;
use crate::naming::FilenameGenerator;
use crate::shard::PathAllocator;
use crate::thumbnail::{StoredSource, ThumbnailPipeline, ThumbnailWarning};
use filekit_hooks::{HookPoint, LifecycleHookBus, StorageEvent};
use filekit_storage::{Backend, BackendConfig, CONTENT_TYPE};
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Per-call switches for [`StorageEngine::save`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Store under the original file name instead of a random one. No collision check.
    pub preserve_name: bool,
    /// Replace whatever is stored at the key instead of refusing.
    pub overwrite: bool,
    /// Passed to the backend; entries here win over the detected `ContentType`.
    pub backend_config: BackendConfig,
    /// Checked before the primary write and before each derivative.
    pub cancel: CancellationToken,
}

impl SaveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn preserve_name(mut self, enable: bool) -> Self {
        self.preserve_name = enable;
        self
    }

    #[must_use]
    pub const fn overwrite(mut self, enable: bool) -> Self {
        self.overwrite = enable;
        self
    }

    #[must_use]
    pub fn backend_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// A stored source and what was derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub key: String,
    pub derivatives: Vec<String>,
    /// Derivatives that failed. The source is stored regardless.
    pub warnings: Vec<ThumbnailWarning>,
    /// The token fired after the source was written; some derivatives were skipped.
    pub cancelled: bool,
}

/// Result of a save that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SavedFile),
    /// The backend refused to create `key` because something is already stored there.
    Rejected { key: String },
}

impl SaveOutcome {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Saved(saved) => &saved.key,
            Self::Rejected { key } => key,
        }
    }

    #[must_use]
    pub const fn saved(&self) -> Option<&SavedFile> {
        match self {
            Self::Saved(saved) => Some(saved),
            Self::Rejected { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// Outcome of deleting one key in [`StorageEngine::delete_all`].
#[derive(Debug)]
pub struct DeleteResult {
    pub key: String,
    pub outcome: Result<bool, EngineError>,
}

#[derive(Debug)]
pub struct EngineInner<B> {
    pub(crate) backend: B,
    pub(crate) config: EngineConfig,
    pub(crate) allocator: PathAllocator,
    pub(crate) names: FilenameGenerator,
    pub(crate) thumbnails: ThumbnailPipeline,
    pub(crate) hooks: LifecycleHookBus,
}

/// Stores files into a sharded namespace on a backend and derives thumbnails.
///
/// Cloning is cheap; clones share the backend, configuration and hook registry.
///
/// # Example
///
/// ```rust
/// use filekit_engine::{EngineConfig, FileHandle, SaveOptions, StorageEngine};
/// use filekit_storage::{Backend, MemoryBackend};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("notes.txt");
/// # std::fs::write(&path, b"hello")?;
/// let engine = StorageEngine::builder()
///     .backend(MemoryBackend::new())
///     .config(EngineConfig::default())
///     .build()?;
///
/// let outcome = engine.save(&FileHandle::from_path(&path)?, SaveOptions::new()).await?;
/// assert!(outcome.key().starts_with("uploads/1/"));
/// assert!(outcome.key().ends_with(".txt"));
///
/// assert!(engine.delete(outcome.key()).await?);
/// assert!(!engine.backend().exists(outcome.key()).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StorageEngine<B> {
    pub(crate) inner: Arc<EngineInner<B>>,
}

impl<B> Clone for StorageEngine<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B> Deref for StorageEngine<B> {
    type Target = EngineInner<B>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl StorageEngine<()> {
    #[must_use = "The engine is not created until you call .build()"]
    pub fn builder() -> StorageEngineBuilder<NoBackend> {
        StorageEngineBuilder::new()
    }
}

impl<B: Backend> StorageEngine<B> {
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The registry observers are added to.
    #[must_use]
    pub fn hooks(&self) -> &LifecycleHookBus {
        &self.hooks
    }

    /// Stores `file` and derives its thumbnails.
    ///
    /// Order of effects: shard and name allocation, `beforeSave`, the primary write,
    /// thumbnails, `afterSave`. A create-if-absent write that finds the key taken returns
    /// [`SaveOutcome::Rejected`]; no thumbnails are made and `afterSave` is not fired.
    /// Thumbnail failures never fail the call; they are listed in
    /// [`SavedFile::warnings`].
    ///
    /// # Errors
    /// Backend failures ([`EngineError::Storage`]), an unreadable source
    /// ([`EngineError::Io`]), name exhaustion, counter problems, and
    /// [`EngineError::Cancelled`] when the token fired before the primary write.
    #[instrument(skip_all, fields(file = %file.path().display()))]
    pub async fn save(&self, file: &FileHandle, options: SaveOptions) -> Result<SaveOutcome, EngineError> {
        let target = self.allocator.target_dir();
        let shard = self.allocator.shard_index(&self.backend).await?;
        let allocation =
            self.names.generate(&self.backend, file, options.preserve_name, target, shard).await?;
        let key = allocation.key;

        if options.cancel.is_cancelled() {
            return Err(EngineError::Cancelled {
                message: key.into(),
                context: Some("Cancelled before the primary write".into()),
            });
        }

        let backend_ref = self.backend.describe();
        self.hooks.fire(StorageEvent::new(HookPoint::BeforeSave, key.clone(), backend_ref.clone()));

        let mut config = BackendConfig::from([(CONTENT_TYPE.to_owned(), file.mime().to_owned())]);
        config.extend(options.backend_config);

        let stored = {
            let source = tokio::fs::File::open(file.path())
                .await
                .context(format!("Opening {}", file.path().display()))?;
            let written = if options.overwrite {
                self.backend.write_upsert(&key, source, &config).await
            } else {
                self.backend.write_create(&key, source, &config).await
            };
            written.context("Writing source")?
        };

        if !stored {
            debug!(%key, "Backend refused the write; key already stored");
            return Ok(SaveOutcome::Rejected { key });
        }

        let report = self
            .thumbnails
            .run(
                &self.backend,
                StoredSource {
                    file,
                    target_dir: target,
                    shard,
                    filename: &allocation.filename,
                    config: &config,
                },
                &options.cancel,
            )
            .await;

        self.hooks.fire(StorageEvent::new(HookPoint::AfterSave, key.clone(), backend_ref));
        info!(%key, derivatives = report.derivatives.len(), warnings = report.warnings.len(), "File saved");

        Ok(SaveOutcome::Saved(SavedFile {
            key,
            derivatives: report.derivatives,
            warnings: report.warnings,
            cancelled: report.cancelled,
        }))
    }

    /// Saves each file in order; one failure does not stop the rest.
    pub async fn save_all(
        &self,
        files: &[FileHandle],
        options: &SaveOptions,
    ) -> Vec<Result<SaveOutcome, EngineError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.save(file, options.clone()).await);
        }
        results
    }

    /// Removes `key`. Returns `false` without firing hooks when nothing is stored there.
    ///
    /// Derivatives are not removed with their source.
    ///
    /// # Errors
    /// Returns [`EngineError::Storage`] when the backend fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<bool, EngineError> {
        if !self.backend.exists(key).await.context("Checking existence before delete")? {
            debug!(key, "Nothing to delete");
            return Ok(false);
        }

        let backend_ref = self.backend.describe();
        self.hooks.fire(StorageEvent::new(HookPoint::BeforeDelete, key, backend_ref.clone()));

        let deleted = self.backend.delete(key).await.context("Deleting blob")?;
        if deleted {
            self.hooks.fire(StorageEvent::new(HookPoint::AfterDelete, key, backend_ref));
            info!(key, "File deleted");
        }
        Ok(deleted)
    }

    /// Deletes each key in order and reports every outcome.
    pub async fn delete_all<I, S>(&self, keys: I) -> Vec<DeleteResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut results = Vec::new();
        for key in keys {
            let key = key.into();
            let outcome = self.delete(&key).await;
            results.push(DeleteResult { key, outcome });
        }
        results
    }
}
