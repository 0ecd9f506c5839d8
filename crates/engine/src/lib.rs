//! # FileKit engine
//!
//! Ingests files into a sharded key namespace on a pluggable [`Backend`](filekit_storage::Backend).
//!
//! A save allocates a shard ([`PathAllocator`]), picks a collision-free name
//! ([`FilenameGenerator`]), notifies observers, writes the source and then derives
//! thumbnails ([`ThumbnailPipeline`]). Deletes check existence first and are otherwise a
//! thin, hooked pass-through.
//!
//! Configuration is read with [`load_config`] into [`EngineConfig`].

mod builder;
mod config;
mod engine;
mod error;
mod file;
pub mod keys;
mod naming;
mod shard;
mod thumbnail;

pub use builder::{NoBackend, StorageEngineBuilder, WithBackend};
pub use config::{
    DEFAULT_MAX_FILES_PER_SHARD, DEFAULT_NAME_ATTEMPTS, DEFAULT_NAME_LENGTH, EngineConfig,
    ShardPolicy, load_config,
};
pub use engine::{DeleteResult, EngineInner, SaveOptions, SaveOutcome, SavedFile, StorageEngine};
pub use error::{EngineError, EngineErrorExt};
pub use file::FileHandle;
pub use naming::{Allocation, FilenameGenerator, NAME_ALPHABET, NameSource, NanoidNames, SeededNames};
pub use shard::PathAllocator;
pub use thumbnail::{PipelineReport, StoredSource, ThumbnailPipeline, ThumbnailStage, ThumbnailWarning};
