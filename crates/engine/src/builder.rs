use crate::config::EngineConfig;
use crate::engine::{EngineInner, StorageEngine};
use crate::error::EngineError;
use crate::naming::{FilenameGenerator, NameSource, NanoidNames};
use crate::shard::PathAllocator;
use crate::thumbnail::ThumbnailPipeline;
use filekit_codec::{FfmpegCodec, ImageCrateResizer, ImageResizer, VideoCodec};
use filekit_hooks::LifecycleHookBus;
use filekit_storage::Backend;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoBackend;
#[derive(Debug)]
pub struct WithBackend<B>(B);

/// Builder for [`StorageEngine`]; `build` exists once a backend is set.
///
/// Unset collaborators default to random nanoid names, the `image` crate resizer,
/// `ffmpeg`/`ffprobe` from `PATH` and an empty hook registry.
#[derive(Debug)]
pub struct StorageEngineBuilder<S = NoBackend> {
    state: S,
    config: EngineConfig,
    names: Option<Arc<dyn NameSource>>,
    resizer: Option<Arc<dyn ImageResizer>>,
    video: Option<Arc<dyn VideoCodec>>,
    hooks: Option<LifecycleHookBus>,
}

impl StorageEngineBuilder<NoBackend> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: NoBackend,
            config: EngineConfig::default(),
            names: None,
            resizer: None,
            video: None,
            hooks: None,
        }
    }

    #[must_use = "Sets the backend files are stored on"]
    pub fn backend<B: Backend>(self, backend: B) -> StorageEngineBuilder<WithBackend<B>> {
        StorageEngineBuilder {
            state: WithBackend(backend),
            config: self.config,
            names: self.names,
            resizer: self.resizer,
            video: self.video,
            hooks: self.hooks,
        }
    }
}

impl Default for StorageEngineBuilder<NoBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StorageEngineBuilder<S> {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn names(mut self, names: impl NameSource + 'static) -> Self {
        self.names = Some(Arc::new(names));
        self
    }

    #[must_use]
    pub fn image_resizer(mut self, resizer: impl ImageResizer + 'static) -> Self {
        self.resizer = Some(Arc::new(resizer));
        self
    }

    #[must_use]
    pub fn video_codec(mut self, codec: impl VideoCodec + 'static) -> Self {
        self.video = Some(Arc::new(codec));
        self
    }

    /// Shares an existing registry, e.g. one observers were already added to.
    #[must_use]
    pub fn hooks(mut self, hooks: LifecycleHookBus) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

impl<B: Backend> StorageEngineBuilder<WithBackend<B>> {
    /// Validates the configuration and assembles the engine.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidConfig`] when [`EngineConfig::validate`] fails.
    pub fn build(self) -> Result<StorageEngine<B>, EngineError> {
        let config = self.config;
        config.validate()?;

        let backend = self.state.0;
        let names = self.names.unwrap_or_else(|| Arc::new(NanoidNames));
        let resizer = self.resizer.unwrap_or_else(|| Arc::new(ImageCrateResizer::new()));
        let video = self.video.unwrap_or_else(|| Arc::new(FfmpegCodec::new()));

        info!(
            backend = %backend.describe(),
            target_dir = %config.target_dir,
            thumbnails = config.thumbnails.len(),
            "Storage engine ready"
        );

        Ok(StorageEngine {
            inner: Arc::new(EngineInner {
                allocator: PathAllocator::new(config.target_dir.clone(), config.max_files_per_shard),
                names: FilenameGenerator::new(names, config.name_attempts, config.name_length),
                thumbnails: ThumbnailPipeline::new(
                    config.thumbnails.clone(),
                    resizer,
                    video,
                    config.temp_dir.clone(),
                ),
                hooks: self.hooks.unwrap_or_default(),
                backend,
                config,
            }),
        })
    }
}
