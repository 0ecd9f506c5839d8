use crate::error::CodecError;
use crate::spec::ThumbnailSpec;
use image::ImageFormat;
use image::imageops::FilterType;
use std::fmt;
use std::io::Cursor;
use tracing::trace;

/// Produces a resized copy of an encoded image.
pub trait ImageResizer: Send + Sync + fmt::Debug {
    /// Scales and center-crops `source` so it exactly covers `spec`.
    ///
    /// # Errors
    /// Returns a [`CodecError`] when `source` cannot be decoded or re-encoded.
    fn fit(&self, source: &[u8], spec: ThumbnailSpec) -> Result<Vec<u8>, CodecError>;
}

/// [`ImageResizer`] backed by the `image` crate; output keeps the source format.
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateResizer {
    filter: FilterType,
}

impl Default for ImageCrateResizer {
    fn default() -> Self {
        Self { filter: FilterType::Lanczos3 }
    }
}

impl ImageCrateResizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl ImageResizer for ImageCrateResizer {
    fn fit(&self, source: &[u8], spec: ThumbnailSpec) -> Result<Vec<u8>, CodecError> {
        if spec.is_empty() {
            return Err(CodecError::UnsupportedFormat {
                message: spec.to_string().into(),
                context: Some("Thumbnail dimensions must be non-zero".into()),
            });
        }

        let format = image::guess_format(source)?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif) {
            return Err(CodecError::UnsupportedFormat {
                message: format!("{format:?}").into(),
                context: Some("Only PNG, JPEG and GIF are resized".into()),
            });
        }

        let decoded = image::load_from_memory_with_format(source, format)?;
        let fitted = decoded.resize_to_fill(spec.width, spec.height, self.filter);

        let mut encoded = Cursor::new(Vec::new());
        fitted.write_to(&mut encoded, format)?;
        trace!(%spec, ?format, bytes = encoded.get_ref().len(), "Image fitted");
        Ok(encoded.into_inner())
    }
}
