use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME types treated as still images; everything else goes down the video path.
pub const IMAGE_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/gif"];

/// Whether a MIME type is on the image allow-list (case-insensitive, parameters ignored).
#[must_use]
pub fn is_image(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    IMAGE_MIME_TYPES.iter().any(|allowed| allowed.eq_ignore_ascii_case(essence))
}

/// One derivative variant: the box a thumbnail is cropped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSpec {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Key segment naming this variant, e.g. `200_150`.
    #[must_use]
    pub fn key_segment(&self) -> String {
        format!("{}_{}", self.width, self.height)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for ThumbnailSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
