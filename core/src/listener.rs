//! Listener registration with disposable subscriptions.
//!
//! [`ListenerSet`] is the observer abstraction used by the lending store and
//! the catalog feed. Registering a listener returns a [`Subscription`]; dropping
//! or unsubscribing it deregisters the listener for good.
//!
//! # Delivery guarantees
//!
//! - Listeners run synchronously on the notifying thread, in registration order.
//! - Once [`Subscription::unsubscribe`] returns, the listener is never invoked
//!   again. If another thread is running it at that moment, `unsubscribe`
//!   blocks until that invocation has finished.
//! - A listener may unsubscribe itself (or any other listener) from inside its
//!   own callback. Unsubscribing itself returns without waiting.
//! - A listener must not call [`ListenerSet::notify`] on the set it belongs to.
//!
//! # Example
//!
//! ```
//! use bookshelf_core::listener::ListenerSet;
//! use std::sync::{Arc, Mutex};
//!
//! let listeners = ListenerSet::<u32>::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = listeners.subscribe(move |value: &u32| {
//!     sink.lock().unwrap().push(*value);
//! });
//!
//! listeners.notify(&1);
//! subscription.unsubscribe();
//! listeners.notify(&2);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1]);
//! ```

use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError, Weak};
use std::thread::{self, ThreadId};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// One registered listener
struct Slot<T> {
    id: u64,
    active: AtomicBool,
    callback: Mutex<Option<Callback<T>>>,
    /// Thread currently inside the callback
    runner: Mutex<Option<ThreadId>>,
}

impl<T> Slot<T> {
    /// Marks the slot dead and drops its callback
    ///
    /// Waits for an invocation running on another thread. From inside the
    /// callback itself it cannot wait; the active flag keeps it from running
    /// again and the callback is dropped with the slot.
    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);

        let reentrant = *self.runner.lock().unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id());

        let callback = if reentrant {
            match self.callback.try_lock() {
                Ok(mut guard) => guard.take(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
                Err(TryLockError::WouldBlock) => None,
            }
        } else {
            self.callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        };
        drop(callback);
    }

    fn set_runner(&self, runner: Option<ThreadId>) {
        *self.runner.lock().unwrap_or_else(PoisonError::into_inner) = runner;
    }
}

struct Registry<T> {
    next_id: AtomicU64,
    slots: Mutex<Vec<Arc<Slot<T>>>>,
}

impl<T> Registry<T> {
    fn remove(&self, id: u64) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|slot| slot.id != id);
    }
}

/// A set of listeners notified with `&T`
///
/// Cloning a `ListenerSet` yields another handle to the same set.
pub struct ListenerSet<T> {
    registry: Arc<Registry<T>>,
}

impl<T: 'static> ListenerSet<T> {
    /// Create an empty listener set
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            id,
            active: AtomicBool::new(true),
            callback: Mutex::new(Some(Box::new(listener))),
            runner: Mutex::new(None),
        });

        self.registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&slot));

        tracing::trace!(listener_id = id, "Listener registered");

        let registry: Weak<Registry<T>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
            slot.deactivate();
            tracing::trace!(listener_id = id, "Listener deregistered");
        })
    }

    /// Invoke every active listener with `value`
    ///
    /// Returns the number of listeners that were invoked.
    pub fn notify(&self, value: &T) -> usize {
        let slots: SmallVec<[Arc<Slot<T>>; 4]> = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();

        let mut delivered = 0;
        for slot in slots {
            let mut callback = slot.callback.lock().unwrap_or_else(PoisonError::into_inner);
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            if let Some(listener) = callback.as_mut() {
                slot.set_runner(Some(thread::current().id()));
                listener(value);
                slot.set_runner(None);
                delivered += 1;
            }
        }
        delivered
    }
}

impl<T> ListenerSet<T> {
    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no listener is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("listeners", &self.len()).finish()
    }
}

/// Handle to a registered listener or remote subscription
///
/// Releasing happens exactly once: on [`unsubscribe`](Self::unsubscribe) or
/// when the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a release action
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    /// Keep the listener registered for as long as its owner lives
    pub fn detach(mut self) {
        self.release = None;
    }

    /// Check if the release action has not run yet
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
