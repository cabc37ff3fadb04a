// MIT License - Copyright (c) 2026 Peter Wright

//! Event delivery: broadcast-backed lazy streams and synchronous
//! callbacks.
//!
//! Each [`Subscription`] owns an independent bounded buffer. A consumer
//! that falls behind loses the oldest entries and sees an explicit
//! [`StreamItem::Overflowed`] marker in their place. Dropping a
//! subscription cancels it; when the client shuts down, a pending
//! `next()` resolves to `None`.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use crate::alarm::{ArmingMode, ArmingState, ZoneState};
use crate::error::PacketError;
use crate::event::Event;

/// Everything observable on the raw event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Transport established.
    Connected,
    /// Transport lost; the client will reconnect.
    Disconnected,
    /// A decoded message from the panel.
    Event(Event),
    /// A line that failed to decode (or, in lenient mode, decoded with a
    /// bad checksum). State is never mutated by these.
    DecodeError(PacketError),
}

/// An arming state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub state: ArmingState,
    pub mode: Option<ArmingMode>,
}

/// A zone state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneChange {
    pub zone: u8,
    pub state: ZoneState,
}

/// One delivery on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem<T> {
    Item(T),
    /// The subscriber fell behind and `missed` entries were dropped.
    Overflowed { missed: u64 },
}

/// A lazy sequence of values fanned out from the reader task.
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { rx }
    }

    /// The next item, or `None` once the client has shut down and the
    /// buffer is drained.
    pub async fn next(&mut self) -> Option<StreamItem<T>> {
        match self.rx.recv().await {
            Ok(item) => Some(StreamItem::Item(item)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(StreamItem::Overflowed { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Like [`next`](Self::next), bounded by a caller-supplied timeout.
    pub async fn next_timeout(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<StreamItem<T>>, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.next()).await
    }
}

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A set of synchronous handlers invoked from the reader task.
pub(crate) struct CallbackRegistry<T> {
    handlers: Arc<Mutex<HashMap<u64, Handler<T>>>>,
    next_id: AtomicU64,
}

impl<T: 'static> CallbackRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Disposer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("callback registry poisoned")
            .insert(id, Box::new(handler));
        let handlers = Arc::downgrade(&self.handlers);
        Disposer {
            dispose: Box::new(move || {
                if let Some(handlers) = handlers.upgrade() {
                    handlers
                        .lock()
                        .expect("callback registry poisoned")
                        .remove(&id);
                }
            }),
        }
    }

    /// Invoke every handler. A panicking handler is logged and discarded;
    /// it never takes the reader task down with it.
    pub(crate) fn emit(&self, value: &T) {
        let handlers = self.handlers.lock().expect("callback registry poisoned");
        for handler in handlers.values() {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                warn!("event handler panicked; continuing");
            }
        }
    }
}

/// Unregisters a callback handler when invoked.
///
/// Dropping the disposer without calling [`dispose`](Self::dispose)
/// leaves the handler registered for the life of the client.
pub struct Disposer {
    dispose: Box<dyn FnOnce() + Send>,
}

impl Disposer {
    pub fn dispose(self) {
        (self.dispose)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_subscription_delivers_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = Subscription::new(rx);
        tx.send(1u32).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        assert_eq!(sub.next().await, Some(StreamItem::Item(1)));
        assert_eq!(sub.next().await, Some(StreamItem::Item(2)));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_subscription_overflow_marker() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new(rx);
        for i in 0..5u32 {
            tx.send(i).unwrap();
        }
        // Oldest entries were dropped; the marker reports how many.
        assert_eq!(sub.next().await, Some(StreamItem::Overflowed { missed: 3 }));
        assert_eq!(sub.next().await, Some(StreamItem::Item(3)));
        assert_eq!(sub.next().await, Some(StreamItem::Item(4)));
    }

    #[tokio::test]
    async fn test_subscription_timeout() {
        let (tx, rx) = broadcast::channel::<u32>(2);
        let mut sub = Subscription::new(rx);
        let result = sub.next_timeout(Duration::from_millis(10)).await;
        assert!(result.is_err());
        drop(tx);
    }

    #[test]
    fn test_callback_registry_dispose() {
        let registry = CallbackRegistry::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count2 = count.clone();
        let disposer = registry.register(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        disposer.dispose();
        registry.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let registry = CallbackRegistry::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let _keep = registry.register(|_| panic!("boom"));
        let count2 = count.clone();
        let _keep2 = registry.register(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        registry.emit(&1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
