//! Facade crate for FileKit.
//! Re-exports the engine, backends, hooks and codecs under one dependency.
//! Keep this crate thin: it composes the other crates and implements nothing.
//!
//! ## Usage
//!
//! ```rust
//! use filekit::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let root = tempfile::tempdir()?;
//! # let source = root.path().join("hello.txt");
//! # std::fs::write(&source, b"hi")?;
//! let backend = LocalBackend::builder().root(root.path().join("blobs")).connect().await?;
//! let engine = StorageEngine::builder().backend(backend).config(EngineConfig::default()).build()?;
//!
//! engine.hooks().on(HookPoint::AfterSave, |event| assert!(event.path.starts_with("uploads/")));
//!
//! let outcome = engine.save(&FileHandle::from_path(&source)?, SaveOptions::new()).await?;
//! assert!(outcome.is_saved());
//! # Ok(())
//! # }
//! ```

pub use filekit_codec as codec;
pub use filekit_engine as engine;
pub use filekit_hooks as hooks;
#[cfg(feature = "logger")]
pub use filekit_logger as logger;
pub use filekit_storage as storage;

/// The types most callers need.
pub mod prelude {
    pub use filekit_codec::{FfmpegCodec, ImageCrateResizer, ImageResizer, ThumbnailSpec, VideoCodec};
    pub use filekit_engine::{
        DeleteResult, EngineConfig, EngineError, FileHandle, SaveOptions, SaveOutcome, SavedFile,
        ShardPolicy, StorageEngine, ThumbnailWarning, load_config,
    };
    pub use filekit_hooks::{HookPoint, HookReceiverExt, LifecycleHookBus, StorageEvent};
    pub use filekit_storage::{Backend, BackendConfig, LocalBackend, MemoryBackend, StorageError};
}

/// Build-time enabled features (by Cargo feature).
pub const ENABLED: &[&str] = &[
    #[cfg(feature = "logger")]
    "logger",
    #[cfg(feature = "opentelemetry")]
    "opentelemetry",
];
