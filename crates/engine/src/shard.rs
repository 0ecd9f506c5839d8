use crate::config::ShardPolicy;
use crate::error::{EngineError, EngineErrorExt};
use crate::keys;
use filekit_storage::{Backend, StorageError};
use tracing::{debug, info};

/// Counter updates retried before reporting contention. Every failed swap means another
/// writer's swap succeeded, so this bounds the number of writers racing on one target.
const SWAP_ATTEMPTS: u32 = 128;

/// Decoded `.dirindex` blob: the active shard and how many slots in it were handed out.
///
/// Stored as `<shard>:<reserved>`. A bare `<shard>` is accepted too; its reservations
/// are then taken from the shard listing alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counter {
    shard: u64,
    reserved: u64,
}

impl Counter {
    fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?.trim();
        let (shard, reserved) = match text.split_once(':') {
            Some((shard, reserved)) => (shard.parse().ok()?, reserved.parse().ok()?),
            None => (text.parse().ok()?, 0),
        };
        (shard > 0).then_some(Self { shard, reserved })
    }

    fn encode(self) -> String {
        format!("{}:{}", self.shard, self.reserved)
    }
}

/// Tracks which shard of a target directory receives new files.
///
/// The counter lives in `<target>/.dirindex`. It starts at shard 1 and the shard number
/// only ever grows. With a limited policy every allocation reserves a slot through
/// [`Backend::compare_and_swap`]: the slot count is bumped in the same swap that reads
/// it, so concurrent writers can never put more than `max + 1` files into one shard.
/// Once a shard holds more than `max` entries the next allocation opens the following
/// shard. A writer that loses a swap re-reads and tries again.
#[derive(Debug, Clone)]
pub struct PathAllocator {
    target_dir: String,
    policy: ShardPolicy,
}

impl PathAllocator {
    #[must_use]
    pub fn new(target_dir: impl Into<String>, policy: ShardPolicy) -> Self {
        Self { target_dir: target_dir.into(), policy }
    }

    #[must_use]
    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    /// Reserves a slot and returns the shard it belongs to, rolling over a full one.
    ///
    /// # Errors
    /// [`EngineError::Storage`] for backend failures, [`EngineError::InvalidCounter`] if
    /// the stored counter cannot be decoded and [`EngineError::ShardContention`] if the
    /// counter keeps moving under concurrent writers.
    pub async fn shard_index<B: Backend>(&self, backend: &B) -> Result<u64, EngineError> {
        let counter_key = keys::counter_key(&self.target_dir);

        for _ in 0..SWAP_ATTEMPTS {
            let Some((raw, current)) = self.read_counter(backend, &counter_key).await? else {
                let first = match self.policy {
                    ShardPolicy::Limited(_) => Counter { shard: 1, reserved: 1 }.encode(),
                    ShardPolicy::Unlimited => "1".to_owned(),
                };
                if backend
                    .compare_and_swap(&counter_key, None, first.as_bytes())
                    .await
                    .context("Initializing shard counter")?
                {
                    info!(target_dir = %self.target_dir, "Shard counter initialized");
                    return Ok(1);
                }
                tokio::task::yield_now().await;
                continue;
            };

            let ShardPolicy::Limited(max) = self.policy else { return Ok(current.shard) };

            let prefix = keys::shard_prefix(&self.target_dir, current.shard);
            let listed = backend.list_entries(&prefix).await.context("Counting shard entries")?;
            let used = current.reserved.max(u64::try_from(listed.len()).unwrap_or(u64::MAX));

            let next = if used <= max {
                Counter { shard: current.shard, reserved: used + 1 }
            } else {
                Counter { shard: current.shard.saturating_add(1), reserved: 1 }
            };

            if backend
                .compare_and_swap(&counter_key, Some(&raw), next.encode().as_bytes())
                .await
                .context("Reserving shard slot")?
            {
                if next.shard != current.shard {
                    info!(target_dir = %self.target_dir, from = current.shard, to = next.shard, used, "Shard rolled over");
                }
                return Ok(next.shard);
            }
            debug!(target_dir = %self.target_dir, shard = current.shard, "Shard counter moved; retrying");
            tokio::task::yield_now().await;
        }

        Err(EngineError::ShardContention {
            message: self.target_dir.clone().into(),
            context: Some(format!("Counter changed {SWAP_ATTEMPTS} times in a row").into()),
        })
    }

    async fn read_counter<B: Backend>(
        &self,
        backend: &B,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Counter)>, EngineError> {
        let raw = match backend.read(key).await {
            Ok(raw) => raw,
            Err(StorageError::NotFound { .. }) => return Ok(None),
            Err(err) => return Err(err).context("Reading shard counter"),
        };

        let counter = Counter::parse(&raw).ok_or_else(|| EngineError::InvalidCounter {
            message: String::from_utf8_lossy(&raw).into_owned().into(),
            context: Some(key.to_owned().into()),
        })?;
        Ok(Some((raw, counter)))
    }
}
