use crate::error::HookError;
use crate::event::{HookPoint, StorageEvent};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Room for mirrored events before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 128;

/// A registered callback.
pub type Observer = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

struct Registry {
    observers: RwLock<FxHashMap<HookPoint, Vec<Observer>>>,
    mirror: broadcast::Sender<Arc<StorageEvent>>,
}

/// Per-engine registry of lifecycle observers.
///
/// Observers run inline, in registration order, on the task that fires the point.
/// They see the event but cannot cancel or alter the operation. The registry lock is
/// released before any observer runs, so an observer may register further observers.
///
/// Every fired event is also mirrored to a broadcast channel for async consumers;
/// having no subscribers is fine.
///
/// Cloning is cheap and clones share observers and the channel.
#[derive(Clone)]
pub struct LifecycleHookBus {
    inner: Arc<Registry>,
}

impl fmt::Debug for LifecycleHookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observers = self.inner.observers.read();
        let counts: Vec<_> =
            HookPoint::ALL.iter().map(|p| (p.as_str(), observers.get(p).map_or(0, Vec::len))).collect();
        f.debug_struct("LifecycleHookBus")
            .field("observers", &counts)
            .field("subscribers", &self.inner.mirror.receiver_count())
            .finish()
    }
}

impl Default for LifecycleHookBus {
    fn default() -> Self {
        Self::build(DEFAULT_CAPACITY)
    }
}

impl LifecycleHookBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus whose mirror channel buffers `capacity` events.
    ///
    /// # Errors
    /// Returns [`HookError::InvalidCapacity`] when `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, HookError> {
        if capacity == 0 {
            return Err(HookError::InvalidCapacity {
                message: "0".into(),
                context: Some("Capacity must be greater than zero".into()),
            });
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        let (mirror, _) = broadcast::channel(capacity);
        Self { inner: Arc::new(Registry { observers: RwLock::new(FxHashMap::default()), mirror }) }
    }

    /// Registers `observer` for `point`, after any already registered.
    pub fn on<F>(&self, point: HookPoint, observer: F)
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        self.inner.observers.write().entry(point).or_default().push(Arc::new(observer));
    }

    #[must_use]
    pub fn observer_count(&self, point: HookPoint) -> usize {
        self.inner.observers.read().get(&point).map_or(0, Vec::len)
    }

    /// Receives a copy of every event fired from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StorageEvent>> {
        self.inner.mirror.subscribe()
    }

    /// Notifies the observers of `event.point` and mirrors the event.
    ///
    /// Returns how many observers were invoked.
    pub fn fire(&self, event: StorageEvent) -> usize {
        let snapshot: Vec<Observer> =
            self.inner.observers.read().get(&event.point).cloned().unwrap_or_default();

        for observer in &snapshot {
            observer(&event);
        }

        let point = event.point;
        let path_len = event.path.len();
        let delivered = self.inner.mirror.send(Arc::new(event)).unwrap_or(0);
        trace!(%point, path_len, observers = snapshot.len(), subscribers = delivered, "Hook fired");
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(LifecycleHookBus::with_capacity(0), Err(HookError::InvalidCapacity { .. })));
        assert!(LifecycleHookBus::with_capacity(1).is_ok());
    }

    #[test]
    fn observers_only_see_their_point() {
        let bus = LifecycleHookBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on(HookPoint::AfterDelete, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.fire(StorageEvent::new(HookPoint::BeforeDelete, "a", "memory")), 0);
        assert_eq!(bus.fire(StorageEvent::new(HookPoint::AfterDelete, "a", "memory")), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_may_register_while_firing() {
        let bus = LifecycleHookBus::new();
        let nested = bus.clone();
        bus.on(HookPoint::BeforeSave, move |_| {
            nested.on(HookPoint::AfterSave, |_| {});
        });

        bus.fire(StorageEvent::new(HookPoint::BeforeSave, "k", "memory"));
        assert_eq!(bus.observer_count(HookPoint::AfterSave), 1);
    }
}
