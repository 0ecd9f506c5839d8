//! The `filekit` command line: save files into, and delete keys from, a local FileKit
//! namespace.

use anyhow::Context;
use clap::{Parser, Subcommand};
use filekit::engine::{EngineConfig, FileHandle, SaveOptions, SaveOutcome, StorageEngine, load_config};
use filekit::logger::LogSettings;
use filekit::storage::{Backend, LocalBackend};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "filekit", version, about = "Store files in a sharded FileKit namespace")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); `FILEKIT__*` variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store files and derive their thumbnails.
    Save {
        /// Keep the original file name instead of generating one.
        #[arg(long)]
        preserve_name: bool,
        /// Replace an existing blob stored under the same key.
        #[arg(long)]
        overwrite: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete stored keys.
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// Where the local backend keeps its blobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub root: PathBuf,
    pub create: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { root: PathBuf::from("data"), create: true }
    }
}

/// The full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub engine: EngineConfig,
    pub log: LogSettings,
}

impl Settings {
    /// Reads `path`, or falls back to defaults when no file is given.
    ///
    /// # Errors
    /// Fails when the file is missing or malformed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(load_config(path)?),
            None => Ok(Self::default()),
        }
    }
}

/// Executes `command`, writing one line per item to `out`.
///
/// Returns how many items failed. Ctrl-C stops thumbnail generation after the file being
/// saved is committed.
///
/// # Errors
/// Fails when the backend or engine cannot be set up, or `out` is not writable.
pub async fn run(command: Command, settings: Settings, out: &mut impl Write) -> anyhow::Result<usize> {
    let backend = LocalBackend::builder()
        .root(&settings.storage.root)
        .create(settings.storage.create)
        .connect()
        .await
        .context("Storage backend is unavailable")?;
    let engine = StorageEngine::builder().backend(backend).config(settings.engine).build()?;

    match command {
        Command::Save { preserve_name, overwrite, files } => {
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; finishing the current file");
                    interrupt.cancel();
                }
            });

            let options =
                SaveOptions::new().preserve_name(preserve_name).overwrite(overwrite).cancel_token(cancel);
            let failed = save_files(&engine, &files, &options, out).await;
            watcher.abort();
            failed
        },
        Command::Delete { keys } => delete_keys(&engine, &keys, out).await,
    }
}

/// Saves each file in turn; rejected and failed saves count as failures.
///
/// # Errors
/// Only when writing to `out` fails.
pub async fn save_files<B: Backend>(
    engine: &StorageEngine<B>,
    files: &[PathBuf],
    options: &SaveOptions,
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let mut failed = 0;

    for path in files {
        if options.cancel.is_cancelled() {
            writeln!(out, "skipped {}", path.display())?;
            failed += 1;
            continue;
        }

        let outcome = match FileHandle::from_path(path) {
            Ok(file) => engine.save(&file, options.clone()).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(SaveOutcome::Saved(saved)) => {
                writeln!(out, "saved {}", saved.key)?;
                for warning in &saved.warnings {
                    writeln!(out, "warning {}: {warning}", saved.key)?;
                }
            },
            Ok(SaveOutcome::Rejected { key }) => {
                writeln!(out, "rejected {key}")?;
                failed += 1;
            },
            Err(err) => {
                writeln!(out, "failed {}: {err}", path.display())?;
                failed += 1;
            },
        }
    }

    info!(total = files.len(), failed, "Save finished");
    Ok(failed)
}

/// Deletes each key; a key that is already gone is reported but is not a failure.
///
/// # Errors
/// Only when writing to `out` fails.
pub async fn delete_keys<B: Backend>(
    engine: &StorageEngine<B>,
    keys: &[String],
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let mut failed = 0;

    for result in engine.delete_all(keys.iter().cloned()).await {
        match result.outcome {
            Ok(true) => writeln!(out, "deleted {}", result.key)?,
            Ok(false) => writeln!(out, "missing {}", result.key)?,
            Err(err) => {
                writeln!(out, "failed {}: {err}", result.key)?;
                failed += 1;
            },
        }
    }

    info!(total = keys.len(), failed, "Delete finished");
    Ok(failed)
}
