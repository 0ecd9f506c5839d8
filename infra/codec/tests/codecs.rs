use filekit_codec::*;
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

#[test]
fn test_fit_crops_to_exact_box() {
    let resizer = ImageCrateResizer::new();
    let thumb = resizer.fit(&encoded(120, 40, ImageFormat::Png), ThumbnailSpec::new(30, 30)).unwrap();

    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!(decoded.dimensions(), (30, 30));
    assert_eq!(image::guess_format(&thumb).unwrap(), ImageFormat::Png);
}

#[test]
fn test_fit_keeps_jpeg_format() {
    let resizer = ImageCrateResizer::new();
    let thumb = resizer.fit(&encoded(64, 64, ImageFormat::Jpeg), ThumbnailSpec::new(20, 10)).unwrap();

    assert_eq!(image::guess_format(&thumb).unwrap(), ImageFormat::Jpeg);
    assert_eq!(image::load_from_memory(&thumb).unwrap().dimensions(), (20, 10));
}

#[test]
fn test_fit_rejects_garbage() {
    let resizer = ImageCrateResizer::new();
    let err = resizer.fit(b"definitely not an image", ThumbnailSpec::new(10, 10)).unwrap_err();
    assert!(matches!(err, CodecError::Image { .. }));
}

#[test]
fn test_fit_rejects_empty_box() {
    let resizer = ImageCrateResizer::new();
    let err = resizer.fit(&encoded(8, 8, ImageFormat::Png), ThumbnailSpec::new(0, 8)).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedFormat { .. }));
}

#[test]
fn test_missing_tool_is_an_io_error() {
    let codec = FfmpegCodec::with_binaries(
        "/nonexistent/filekit-ffmpeg",
        "/nonexistent/filekit-ffprobe",
    );

    let err = codec.probe_duration(Path::new("clip.mp4")).unwrap_err();
    assert!(matches!(err, CodecError::Io { .. }), "unexpected: {err:?}");

    let err = codec
        .extract_frame(Path::new("clip.mp4"), Duration::ZERO, None, Path::new("frame.jpg"))
        .unwrap_err();
    assert!(matches!(err, CodecError::Io { .. }), "unexpected: {err:?}");
}

#[test]
fn test_spec_deserializes_from_config_shape() {
    let specs: Vec<ThumbnailSpec> =
        serde_json::from_str(r#"[{"width": 200, "height": 200}, {"width": 64, "height": 48}]"#).unwrap();
    assert_eq!(specs, [ThumbnailSpec::new(200, 200), ThumbnailSpec::new(64, 48)]);
}
