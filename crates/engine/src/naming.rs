use crate::error::{EngineError, EngineErrorExt};
use crate::file::FileHandle;
use crate::keys;
use filekit_storage::Backend;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// URL- and filesystem-safe characters random names are drawn from.
pub const NAME_ALPHABET: [char; 64] = nanoid::alphabet::SAFE;

/// Source of random base names.
pub trait NameSource: Send + Sync + fmt::Debug {
    fn next_name(&self, length: usize) -> String;
}

/// Names from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanoidNames;

impl NameSource for NanoidNames {
    fn next_name(&self, length: usize) -> String {
        nanoid::nanoid!(length, &NAME_ALPHABET)
    }
}

/// Reproducible names from a seeded generator, for tests and fixtures.
#[derive(Debug)]
pub struct SeededNames {
    rng: Mutex<StdRng>,
}

impl SeededNames {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl NameSource for SeededNames {
    fn next_name(&self, length: usize) -> String {
        let mut rng = self.rng.lock();
        (0..length).map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())]).collect()
    }
}

/// A chosen file name and the full key it will be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub filename: String,
    pub key: String,
    /// Existence checks performed; zero for preserved names.
    pub attempts: u32,
}

/// Picks file names inside a shard.
#[derive(Debug, Clone)]
pub struct FilenameGenerator {
    names: Arc<dyn NameSource>,
    max_attempts: u32,
    length: usize,
}

impl FilenameGenerator {
    #[must_use]
    pub fn new(names: Arc<dyn NameSource>, max_attempts: u32, length: usize) -> Self {
        Self { names, max_attempts, length }
    }

    /// Chooses the name for `file` in shard `shard` of `target`.
    ///
    /// With `preserve_name` the original name is used as is and nothing is checked.
    /// Otherwise random names carrying the original extension are tried until one is
    /// absent from the backend, at most `max_attempts` times.
    ///
    /// # Errors
    /// [`EngineError::NameAllocationExhausted`] when every attempt collided,
    /// [`EngineError::InvalidFileName`] for a preserved name that is not a plain file
    /// name, and [`EngineError::Storage`] for backend failures.
    pub async fn generate<B: Backend>(
        &self,
        backend: &B,
        file: &FileHandle,
        preserve_name: bool,
        target: &str,
        shard: u64,
    ) -> Result<Allocation, EngineError> {
        if preserve_name {
            let filename = file.original_name();
            if filename.is_empty() || filename.contains(['/', '\\']) || matches!(filename, "." | "..")
            {
                return Err(EngineError::InvalidFileName {
                    message: filename.to_owned().into(),
                    context: Some("Preserved names must be a single key segment".into()),
                });
            }
            return Ok(Allocation {
                filename: filename.to_owned(),
                key: keys::source_key(target, shard, filename),
                attempts: 0,
            });
        }

        let suffix = file.extension().map(|ext| format!(".{ext}")).unwrap_or_default();
        for attempt in 1..=self.max_attempts {
            let filename = format!("{}{suffix}", self.names.next_name(self.length));
            let key = keys::source_key(target, shard, &filename);
            if !backend.exists(&key).await.context("Checking name availability")? {
                debug!(%key, attempt, "Name allocated");
                return Ok(Allocation { filename, key, attempts: attempt });
            }
            debug!(%key, attempt, "Generated name already taken");
        }

        warn!(target_dir = target, shard, attempts = self.max_attempts, "Name allocation exhausted");
        Err(EngineError::NameAllocationExhausted { attempts: self.max_attempts, context: None })
    }
}
