//! Derivative generation for freshly stored sources.
//!
//! Every derivative is independent: a failure is recorded as a [`ThumbnailWarning`] and
//! the remaining variants are still attempted. Nothing here can fail the save itself.

use crate::file::FileHandle;
use crate::keys;
use filekit_codec::{ImageResizer, ThumbnailSpec, VideoCodec, is_image, representative_timestamp};
use filekit_storage::{Backend, BackendConfig, CONTENT_TYPE};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const FRAME_MIME: &str = "image/jpeg";

/// Where in the pipeline a derivative failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailStage {
    ReadSource,
    Resize,
    Probe,
    ExtractFrame,
    Upload,
}

impl fmt::Display for ThumbnailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadSource => "read-source",
            Self::Resize => "resize",
            Self::Probe => "probe",
            Self::ExtractFrame => "extract-frame",
            Self::Upload => "upload",
        })
    }
}

/// A derivative that could not be produced.
///
/// `spec` is `None` for the video cover and for failures shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailWarning {
    pub spec: Option<ThumbnailSpec>,
    pub stage: ThumbnailStage,
    pub message: String,
}

impl fmt::Display for ThumbnailWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spec {
            Some(spec) => write!(f, "thumbnail {spec} failed at {}: {}", self.stage, self.message),
            None => write!(f, "thumbnail failed at {}: {}", self.stage, self.message),
        }
    }
}

/// What one pipeline run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Keys of derivatives written, in generation order.
    pub derivatives: Vec<String>,
    pub warnings: Vec<ThumbnailWarning>,
    /// Set when the token fired before every derivative was attempted.
    pub cancelled: bool,
}

impl PipelineReport {
    fn warn(&mut self, spec: Option<ThumbnailSpec>, stage: ThumbnailStage, message: impl fmt::Display) {
        let warning = ThumbnailWarning { spec, stage, message: message.to_string() };
        warn!(%warning, "Derivative skipped");
        self.warnings.push(warning);
    }

    fn check_cancelled(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            debug!(written = self.derivatives.len(), "Thumbnail generation cancelled");
            self.cancelled = true;
        }
        self.cancelled
    }
}

/// The source a pipeline run works from: the local file and where it was stored.
#[derive(Debug, Clone, Copy)]
pub struct StoredSource<'a> {
    pub file: &'a FileHandle,
    pub target_dir: &'a str,
    pub shard: u64,
    pub filename: &'a str,
    /// Options the source was written with; derivatives inherit them.
    pub config: &'a BackendConfig,
}

impl StoredSource<'_> {
    /// The source's options with `ContentType` set to the derivative's own type.
    fn derivative_config(&self, mime: &str) -> BackendConfig {
        let mut config = self.config.clone();
        config.insert(CONTENT_TYPE.to_owned(), mime.to_owned());
        config
    }
}

/// Produces the configured derivatives of one stored source.
#[derive(Debug, Clone)]
pub struct ThumbnailPipeline {
    specs: Vec<ThumbnailSpec>,
    resizer: Arc<dyn ImageResizer>,
    video: Arc<dyn VideoCodec>,
    temp_dir: Option<PathBuf>,
}

impl ThumbnailPipeline {
    #[must_use]
    pub fn new(
        specs: Vec<ThumbnailSpec>,
        resizer: Arc<dyn ImageResizer>,
        video: Arc<dyn VideoCodec>,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        Self { specs, resizer, video, temp_dir }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.specs.is_empty()
    }

    #[must_use]
    pub fn specs(&self) -> &[ThumbnailSpec] {
        &self.specs
    }

    /// Generates every derivative of `source`, checking `cancel` before each one.
    pub async fn run<B: Backend>(
        &self,
        backend: &B,
        source: StoredSource<'_>,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let mut report = PipelineReport::default();
        if !self.is_enabled() {
            return report;
        }

        if is_image(source.file.mime()) {
            self.run_image(backend, source, cancel, &mut report).await;
        } else {
            self.run_video(backend, source, cancel, &mut report).await;
        }

        debug!(
            source = source.filename,
            derivatives = report.derivatives.len(),
            warnings = report.warnings.len(),
            "Thumbnail pipeline finished"
        );
        report
    }

    async fn run_image<B: Backend>(
        &self,
        backend: &B,
        source: StoredSource<'_>,
        cancel: &CancellationToken,
        report: &mut PipelineReport,
    ) {
        let original: Arc<[u8]> = match tokio::fs::read(source.file.path()).await {
            Ok(bytes) => bytes.into(),
            Err(err) => return report.warn(None, ThumbnailStage::ReadSource, err),
        };
        let config = source.derivative_config(source.file.mime());

        for &spec in &self.specs {
            if report.check_cancelled(cancel) {
                return;
            }

            let resizer = Arc::clone(&self.resizer);
            let bytes = Arc::clone(&original);
            let fitted = match task::spawn_blocking(move || resizer.fit(&bytes, spec)).await {
                Ok(Ok(fitted)) => fitted,
                Ok(Err(err)) => {
                    report.warn(Some(spec), ThumbnailStage::Resize, err);
                    continue;
                },
                Err(err) => {
                    report.warn(Some(spec), ThumbnailStage::Resize, err);
                    continue;
                },
            };

            let key = keys::image_derivative_key(source.target_dir, spec, source.shard, source.filename);
            upload(backend, &key, fitted.as_slice(), &config, Some(spec), report).await;
        }
    }

    async fn run_video<B: Backend>(
        &self,
        backend: &B,
        source: StoredSource<'_>,
        cancel: &CancellationToken,
        report: &mut PipelineReport,
    ) {
        if report.check_cancelled(cancel) {
            return;
        }

        let codec = Arc::clone(&self.video);
        let path = source.file.path().to_path_buf();
        let duration = match task::spawn_blocking(move || codec.probe_duration(&path)).await {
            Ok(Ok(duration)) => duration,
            Ok(Err(err)) => return report.warn(None, ThumbnailStage::Probe, err),
            Err(err) => return report.warn(None, ThumbnailStage::Probe, err),
        };
        let at = representative_timestamp(duration);
        let config = source.derivative_config(FRAME_MIME);

        let cover = keys::video_cover_key(source.target_dir, source.shard, source.filename);
        self.frame(backend, source.file.path(), at, None, &cover, &config, report).await;

        for &spec in &self.specs {
            if report.check_cancelled(cancel) {
                return;
            }
            let key = keys::video_derivative_key(source.target_dir, spec, source.shard, source.filename);
            self.frame(backend, source.file.path(), at, Some(spec), &key, &config, report).await;
        }
    }

    /// Renders one frame into a private temp file and uploads it to `key`.
    async fn frame<B: Backend>(
        &self,
        backend: &B,
        video: &Path,
        at: Duration,
        resize: Option<ThumbnailSpec>,
        key: &str,
        config: &BackendConfig,
        report: &mut PipelineReport,
    ) {
        // Removed on drop, whichever way this function returns.
        let temp = match self.temp_frame() {
            Ok(temp) => temp,
            Err(err) => return report.warn(resize, ThumbnailStage::ExtractFrame, err),
        };

        let codec = Arc::clone(&self.video);
        let source = video.to_path_buf();
        let dest = temp.path().to_path_buf();
        match task::spawn_blocking(move || codec.extract_frame(&source, at, resize, &dest)).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => return report.warn(resize, ThumbnailStage::ExtractFrame, err),
            Err(err) => return report.warn(resize, ThumbnailStage::ExtractFrame, err),
        }

        match tokio::fs::File::open(temp.path()).await {
            Ok(frame) => upload(backend, key, frame, config, resize, report).await,
            Err(err) => report.warn(resize, ThumbnailStage::Upload, err),
        }
    }

    fn temp_frame(&self) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("filekit-frame-").suffix(".jpg");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

async fn upload<B, R>(
    backend: &B,
    key: &str,
    data: R,
    config: &BackendConfig,
    spec: Option<ThumbnailSpec>,
    report: &mut PipelineReport,
) where
    B: Backend,
    R: tokio::io::AsyncRead + Send + Unpin,
{
    match backend.write_upsert(key, data, config).await {
        Ok(true) => {
            debug!(key, "Derivative stored");
            report.derivatives.push(key.to_owned());
        },
        Ok(false) => report.warn(spec, ThumbnailStage::Upload, format!("backend refused {key}")),
        Err(err) => report.warn(spec, ThumbnailStage::Upload, err),
    }
}
