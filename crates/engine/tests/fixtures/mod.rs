#![allow(dead_code, unreachable_pub)]

use filekit_codec::{CodecError, ImageResizer, ThumbnailSpec, VideoCodec};
use filekit_engine::*;
use filekit_hooks::{HookPoint, LifecycleHookBus};
use filekit_storage::MemoryBackend;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const TARGET: &str = "u";
pub const SEED: u64 = 42;

/// Source files for a test, removed with the struct.
#[derive(Debug)]
pub struct Sources {
    dir: TempDir,
}

impl Sources {
    pub fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str, content: &[u8]) -> FileHandle {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        FileHandle::from_path(path).unwrap()
    }

    pub fn missing(&self, name: &str) -> FileHandle {
        FileHandle::from_path(self.dir.path().join(name)).unwrap()
    }
}

pub fn config(policy: ShardPolicy) -> EngineConfig {
    EngineConfig { target_dir: TARGET.to_owned(), max_files_per_shard: policy, ..EngineConfig::default() }
}

pub fn engine(backend: &MemoryBackend, config: EngineConfig) -> StorageEngine<MemoryBackend> {
    StorageEngine::builder()
        .backend(backend.clone())
        .config(config)
        .names(SeededNames::new(SEED))
        .image_resizer(LabelResizer::default())
        .video_codec(FakeVideo::default())
        .build()
        .unwrap()
}

/// Records `<point>:<path>` for every hook fired.
pub fn record_hooks(hooks: &LifecycleHookBus) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for point in HookPoint::ALL {
        let log = Arc::clone(&log);
        hooks.on(point, move |event| log.lock().push(format!("{}:{}", event.point, event.path)));
    }
    log
}

pub fn shard_of(key: &str) -> u64 {
    key.split('/').nth(1).unwrap().parse().unwrap()
}

pub fn saved(outcome: Result<SaveOutcome, EngineError>) -> SavedFile {
    match outcome {
        Ok(SaveOutcome::Saved(file)) => file,
        other => panic!("expected a saved file, got {other:?}"),
    }
}

/// Resizer that labels its output, failing for chosen specs.
#[derive(Debug, Default)]
pub struct LabelResizer {
    pub fail: Vec<ThumbnailSpec>,
    /// Fired after the first successful resize.
    pub cancel_after_first: Option<CancellationToken>,
}

impl ImageResizer for LabelResizer {
    fn fit(&self, source: &[u8], spec: ThumbnailSpec) -> Result<Vec<u8>, CodecError> {
        if self.fail.contains(&spec) {
            return Err(CodecError::UnsupportedFormat {
                message: format!("refusing {spec}").into(),
                context: None,
            });
        }
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        Ok(format!("{spec}:{}", source.len()).into_bytes())
    }
}

/// Video codec that writes a text description instead of a JPEG.
#[derive(Debug, Clone)]
pub struct FakeVideo {
    pub duration: Option<Duration>,
    pub fail: Vec<ThumbnailSpec>,
    pub frames: Arc<Mutex<Vec<PathBuf>>>,
}

impl Default for FakeVideo {
    fn default() -> Self {
        Self { duration: Some(Duration::from_secs(30)), fail: Vec::new(), frames: Arc::default() }
    }
}

impl VideoCodec for FakeVideo {
    fn probe_duration(&self, _source: &Path) -> Result<Duration, CodecError> {
        self.duration.ok_or_else(|| CodecError::InvalidDuration { message: "N/A".into(), context: None })
    }

    fn extract_frame(
        &self,
        _source: &Path,
        at: Duration,
        resize: Option<ThumbnailSpec>,
        dest: &Path,
    ) -> Result<(), CodecError> {
        self.frames.lock().push(dest.to_path_buf());
        if resize.is_some_and(|spec| self.fail.contains(&spec)) {
            return Err(CodecError::Tool { message: "decoder crashed".into(), context: None });
        }
        let label = resize.map_or_else(|| "cover".to_owned(), |spec| spec.to_string());
        std::fs::write(dest, format!("{label}@{}", at.as_secs()))?;
        Ok(())
    }
}
