pub mod fixtures;

use filekit_codec::{ImageCrateResizer, ThumbnailSpec};
use filekit_engine::*;
use filekit_storage::{Backend, CONTENT_TYPE, LocalBackend, MemoryBackend, Operation};
use fixtures::*;
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SMALL: ThumbnailSpec = ThumbnailSpec::new(64, 64);
const WIDE: ThumbnailSpec = ThumbnailSpec::new(200, 100);

fn thumbnail_config() -> EngineConfig {
    EngineConfig { thumbnails: vec![SMALL, WIDE], ..config(ShardPolicy::Limited(100)) }
}

fn engine_with(
    backend: &MemoryBackend,
    resizer: LabelResizer,
    video: FakeVideo,
) -> StorageEngine<MemoryBackend> {
    StorageEngine::builder()
        .backend(backend.clone())
        .config(thumbnail_config())
        .names(SeededNames::new(SEED))
        .image_resizer(resizer)
        .video_codec(video)
        .build()
        .unwrap()
}

fn filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn test_image_derivatives_follow_layout() {
    let backend = MemoryBackend::new();
    let engine = engine_with(&backend, LabelResizer::default(), FakeVideo::default());
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("cat.png", b"pngdata"), SaveOptions::new()).await);
    let name = filename(&file.key);

    assert_eq!(
        file.derivatives,
        [format!("u/thumbnails/64_64/1/{name}"), format!("u/thumbnails/200_100/1/{name}")]
    );
    assert!(file.warnings.is_empty());
    let small = backend.get(&file.derivatives[0]).unwrap();
    assert_eq!(small.data, b"64x64:7");
    assert_eq!(small.config[CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_derivatives_inherit_caller_options() {
    let backend = MemoryBackend::new();
    let engine = engine_with(&backend, LabelResizer::default(), FakeVideo::default());
    let sources = Sources::new();
    let options = SaveOptions::new().backend_option("Acl", "public-read").backend_option("CacheControl", "max-age=60");

    let image = saved(engine.save(&sources.file("cat.png", b"png"), options.clone()).await);
    let video = saved(engine.save(&sources.file("clip.mp4", b"mp4"), options).await);

    let source = backend.get(&image.key).unwrap().config;
    assert_eq!(source["Acl"], "public-read");
    for key in &image.derivatives {
        let stored = backend.get(key).unwrap().config;
        assert_eq!(stored["Acl"], source["Acl"], "{key}");
        assert_eq!(stored["CacheControl"], "max-age=60");
        assert_eq!(stored[CONTENT_TYPE], "image/png");
    }

    assert_eq!(backend.get(&video.key).unwrap().config[CONTENT_TYPE], "video/mp4");
    assert_eq!(video.derivatives.len(), 3);
    for key in &video.derivatives {
        let stored = backend.get(key).unwrap().config;
        assert_eq!(stored["Acl"], "public-read", "{key}");
        assert_eq!(stored[CONTENT_TYPE], "image/jpeg");
    }
}

#[tokio::test]
async fn test_failed_derivative_does_not_block_siblings() {
    let backend = MemoryBackend::new();
    let resizer = LabelResizer { fail: vec![SMALL], ..LabelResizer::default() };
    let engine = engine_with(&backend, resizer, FakeVideo::default());
    let hooks = record_hooks(engine.hooks());
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("cat.jpg", b"jpeg"), SaveOptions::new()).await);

    assert!(backend.contains(&file.key));
    assert_eq!(file.derivatives, [format!("u/thumbnails/200_100/1/{}", filename(&file.key))]);
    assert_eq!(file.warnings.len(), 1);
    assert_eq!(file.warnings[0].spec, Some(SMALL));
    assert_eq!(file.warnings[0].stage, ThumbnailStage::Resize);
    assert_eq!(hooks.lock().last().unwrap(), &format!("afterSave:{}", file.key));
}

#[tokio::test]
async fn test_upload_failures_become_warnings() {
    let backend = MemoryBackend::new();
    backend.inject_fault(Operation::Write, "u/thumbnails/");
    let engine = engine_with(&backend, LabelResizer::default(), FakeVideo::default());
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("cat.gif", b"gif"), SaveOptions::new()).await);

    assert!(file.derivatives.is_empty());
    assert_eq!(file.warnings.len(), 2);
    assert!(file.warnings.iter().all(|w| w.stage == ThumbnailStage::Upload));
    assert!(backend.contains(&file.key));
}

#[tokio::test]
async fn test_video_gets_cover_and_frames() {
    let backend = MemoryBackend::new();
    let video = FakeVideo::default();
    let frames = video.frames.clone();
    let engine = engine_with(&backend, LabelResizer::default(), video);
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("clip.mp4", b"mp4"), SaveOptions::new()).await);
    let stem = filename(&file.key).trim_end_matches(".mp4");

    assert_eq!(
        file.derivatives,
        [
            format!("u/thumbnails/1/{stem}.jpg"),
            format!("u/thumbnails/64_64/1/{stem}.jpg"),
            format!("u/thumbnails/200_100/1/{stem}.jpg"),
        ]
    );
    assert_eq!(backend.get(&file.derivatives[0]).unwrap().data, b"cover@10");
    assert_eq!(backend.get(&file.derivatives[2]).unwrap().data, b"200x100@10");
    assert_eq!(backend.get(&file.derivatives[1]).unwrap().config[CONTENT_TYPE], "image/jpeg");

    let frames = frames.lock();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|path| !path.exists()), "temp frames must be removed");
    let mut unique = frames.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_video_frame_failure_is_isolated() {
    let backend = MemoryBackend::new();
    let video = FakeVideo { fail: vec![SMALL], ..FakeVideo::default() };
    let frames = video.frames.clone();
    let engine = engine_with(&backend, LabelResizer::default(), video);
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("clip.mov", b"mov"), SaveOptions::new()).await);

    assert_eq!(file.derivatives.len(), 2);
    assert_eq!(file.warnings.len(), 1);
    assert_eq!(file.warnings[0].stage, ThumbnailStage::ExtractFrame);
    assert!(frames.lock().iter().all(|path| !path.exists()));
}

#[tokio::test]
async fn test_unusable_duration_skips_video_derivatives() {
    let backend = MemoryBackend::new();
    let video = FakeVideo { duration: None, ..FakeVideo::default() };
    let frames = video.frames.clone();
    let engine = engine_with(&backend, LabelResizer::default(), video);
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("clip.mp4", b"broken"), SaveOptions::new()).await);

    assert!(backend.contains(&file.key));
    assert!(file.derivatives.is_empty());
    assert_eq!(file.warnings.len(), 1);
    assert_eq!(file.warnings[0].stage, ThumbnailStage::Probe);
    assert_eq!(file.warnings[0].spec, None);
    assert!(frames.lock().is_empty());
}

#[tokio::test]
async fn test_cancellation_after_write_keeps_source() {
    let backend = MemoryBackend::new();
    let token = CancellationToken::new();
    let resizer = LabelResizer { cancel_after_first: Some(token.clone()), ..LabelResizer::default() };
    let engine = engine_with(&backend, resizer, FakeVideo::default());
    let sources = Sources::new();

    let file = saved(
        engine.save(&sources.file("cat.png", b"png"), SaveOptions::new().cancel_token(token)).await,
    );

    assert!(file.cancelled);
    assert_eq!(file.derivatives.len(), 1);
    assert!(backend.contains(&file.key));
}

#[tokio::test]
async fn test_rejected_save_produces_no_derivatives() {
    let backend = MemoryBackend::new();
    let engine = engine_with(&backend, LabelResizer::default(), FakeVideo::default());
    let sources = Sources::new();
    let options = SaveOptions::new().preserve_name(true);

    saved(engine.save(&sources.file("cat.png", b"one"), options.clone()).await);
    let before = backend.len();
    let second = engine.save(&sources.file("cat.png", b"two"), options).await.unwrap();

    assert!(!second.is_saved());
    assert_eq!(backend.len(), before);
}

#[tokio::test]
async fn test_real_resize_on_local_backend() {
    let root = tempfile::tempdir().unwrap();
    let backend = LocalBackend::builder().root(root.path()).connect().await.unwrap();
    let engine = StorageEngine::builder()
        .backend(backend.clone())
        .config(EngineConfig { thumbnails: vec![SMALL, WIDE], ..config(ShardPolicy::Limited(100)) })
        .image_resizer(ImageCrateResizer::new())
        .build()
        .unwrap();

    let img = RgbImage::from_fn(320, 240, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 0]));
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png).unwrap();
    let sources = Sources::new();

    let file = saved(engine.save(&sources.file("photo.png", png.get_ref()), SaveOptions::new()).await);

    assert!(file.warnings.is_empty(), "{:?}", file.warnings);
    for (key, spec) in file.derivatives.iter().zip([SMALL, WIDE]) {
        let thumb = image::load_from_memory(&backend.read(key).await.unwrap()).unwrap();
        assert_eq!(thumb.dimensions(), (spec.width, spec.height));
    }
    assert_eq!(backend.read(&file.key).await.unwrap(), *png.get_ref());
}

#[test]
fn test_cover_timestamp_is_a_third() {
    assert_eq!(filekit_codec::representative_timestamp(Duration::from_secs(30)), Duration::from_secs(10));
}
