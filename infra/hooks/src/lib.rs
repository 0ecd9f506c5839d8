//! # Lifecycle hooks
//!
//! Ordered, synchronous notifications fired by the storage engine around every save and
//! delete: `beforeSave`, `afterSave`, `beforeDelete` and `afterDelete`.
//!
//! Observers are registered on a [`LifecycleHookBus`] owned by one engine instance; there
//! is no process-wide registry. Each fired [`StorageEvent`] is also mirrored to a
//! broadcast channel so async tasks can audit or replicate operations.
//!
//! # Example
//!
//! ```rust
//! use filekit_hooks::{HookPoint, HookReceiverExt, LifecycleHookBus, StorageEvent};
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = LifecycleHookBus::new();
//!     let seen = Arc::new(Mutex::new(Vec::new()));
//!
//!     let log = Arc::clone(&seen);
//!     bus.on(HookPoint::AfterSave, move |event| log.lock().unwrap().push(event.path.clone()));
//!
//!     let mut rx = bus.subscribe();
//!     bus.fire(StorageEvent::new(HookPoint::AfterSave, "uploads/1/a.png", "memory"));
//!
//!     assert_eq!(*seen.lock().unwrap(), ["uploads/1/a.png"]);
//!     assert_eq!(rx.recv_event().await.unwrap().path, "uploads/1/a.png");
//! }
//! ```

mod bus;
mod error;
mod event;
mod receiver;

pub use bus::{LifecycleHookBus, Observer};
pub use error::{HookError, HookErrorExt};
pub use event::{HookPoint, StorageEvent};
pub use receiver::HookReceiverExt;
