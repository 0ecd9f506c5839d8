//! Key layout of stored blobs and their derivatives.
//!
//! ```text
//! <target>/.dirindex                                 shard counter
//! <target>/<shard>/<file>                            source
//! <target>/thumbnails/<w>_<h>/<shard>/<file>         image derivative
//! <target>/thumbnails/<w>_<h>/<shard>/<stem>.jpg     video derivative
//! <target>/thumbnails/<shard>/<stem>.jpg             video cover
//! ```
//!
//! The cover is not keyed as `thumbnails/<original-name>.jpg`. It lives under the shard
//! and takes the stored name's stem, so two uploads of `clip.mp4` get separate covers.

use crate::file::stem;
use filekit_codec::ThumbnailSpec;
use filekit_storage::join_key;

pub const COUNTER_NAME: &str = ".dirindex";
pub const THUMBNAILS_DIR: &str = "thumbnails";

#[must_use]
pub fn counter_key(target: &str) -> String {
    join_key([target, COUNTER_NAME])
}

#[must_use]
pub fn shard_prefix(target: &str, shard: u64) -> String {
    join_key([target, &shard.to_string()])
}

#[must_use]
pub fn source_key(target: &str, shard: u64, filename: &str) -> String {
    join_key([target, &shard.to_string(), filename])
}

#[must_use]
pub fn image_derivative_key(target: &str, spec: ThumbnailSpec, shard: u64, filename: &str) -> String {
    join_key([target, THUMBNAILS_DIR, &spec.key_segment(), &shard.to_string(), filename])
}

#[must_use]
pub fn video_derivative_key(target: &str, spec: ThumbnailSpec, shard: u64, filename: &str) -> String {
    let frame = format!("{}.jpg", stem(filename));
    join_key([target, THUMBNAILS_DIR, &spec.key_segment(), &shard.to_string(), &frame])
}

/// Cover frame of a video, keyed by shard and stored stem rather than the original name.
#[must_use]
pub fn video_cover_key(target: &str, shard: u64, filename: &str) -> String {
    let frame = format!("{}.jpg", stem(filename));
    join_key([target, THUMBNAILS_DIR, &shard.to_string(), &frame])
}
