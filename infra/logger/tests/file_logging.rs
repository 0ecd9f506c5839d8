use filekit_logger::{LevelFilter, LogSettings, Logger, LoggerError};
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

// Each test binary gets one global subscriber, so only the first init may succeed.
#[test]
#[serial]
fn file_logging_then_second_init_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let settings = LogSettings {
        console: false,
        dir: Some(log_dir.clone()),
        ..LogSettings::default()
    };
    let logger = Logger::from_settings("filekit-file-logging", &settings)?;
    assert!(logger.guard().is_some(), "file output must hold a worker guard");

    tracing::info!(key = "uploads/1/abc.png", "hello from integration test");

    let err = Logger::builder()
        .name("filekit-second")
        .level(LevelFilter::INFO)
        .init()
        .expect_err("second init should fail");
    assert!(matches!(err, LoggerError::Subscriber { .. }));

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    assert!(fs::metadata(&log_file)?.len() > 0, "log file should not be empty");
    Ok(())
}
