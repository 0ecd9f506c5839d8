//! Thumbnail codecs for FileKit.
//!
//! Two collaborators sit behind object-safe traits so the engine can swap them in tests:
//!
//! - [`ImageResizer`]: fit-resizes an encoded PNG, JPEG or GIF ([`ImageCrateResizer`]).
//! - [`VideoCodec`]: probes a video's duration and renders a frame to a JPEG file
//!   ([`FfmpegCodec`]).
//!
//! Both are synchronous.
//!
//! # Example
//!
//! ```rust
//! use filekit_codec::{ImageCrateResizer, ImageResizer, ThumbnailSpec};
//! use image::{ImageFormat, RgbImage};
//! use std::io::Cursor;
//!
//! let mut png = Cursor::new(Vec::new());
//! RgbImage::new(64, 32).write_to(&mut png, ImageFormat::Png).unwrap();
//!
//! let thumb = ImageCrateResizer::new().fit(png.get_ref(), ThumbnailSpec::new(16, 16)).unwrap();
//! let decoded = image::load_from_memory(&thumb).unwrap();
//! assert_eq!((decoded.width(), decoded.height()), (16, 16));
//! ```

mod error;
mod resize;
mod spec;
mod video;

pub use error::{CodecError, CodecErrorExt};
pub use resize::{ImageCrateResizer, ImageResizer};
pub use spec::{IMAGE_MIME_TYPES, ThumbnailSpec, is_image};
pub use video::{FfmpegCodec, VideoCodec, parse_duration, representative_timestamp};
