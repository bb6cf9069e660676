//! Hand-driven catalog source for deterministic feed tests
//!
//! [`ScriptedCatalogSource`] behaves like a transport that never forgets a
//! handler: events emitted after the feed unsubscribed still reach the
//! handler, the way a notification already in flight would. That makes it the
//! tool for checking that teardown really silences the sink.

#![allow(clippy::module_name_repetitions)]

use bookshelf_core::listener::Subscription;
use bookshelf_core::source::{CatalogSource, EventHandler, FeedError, SourceEvent};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct ScriptState {
    handlers: Vec<(String, EventHandler)>,
    initial: Option<Option<Value>>,
    refusal: Option<String>,
}

/// Catalog source driven by the test
///
/// # Example
///
/// ```
/// use bookshelf_testing::ScriptedCatalogSource;
/// use bookshelf_core::source::{CatalogSource, SourceEvent};
/// use std::sync::{Arc, Mutex};
///
/// let source = ScriptedCatalogSource::new();
/// let events = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&events);
/// let _subscription = source
///     .subscribe("books", Arc::new(move |event: SourceEvent| sink.lock().unwrap().push(event)))
///     .unwrap();
///
/// source.emit_absent();
/// assert_eq!(*events.lock().unwrap(), vec![SourceEvent::Snapshot(None)]);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedCatalogSource {
    state: Arc<Mutex<ScriptState>>,
    subscribed: Arc<AtomicUsize>,
    unsubscribed: Arc<AtomicUsize>,
}

impl ScriptedCatalogSource {
    /// Create a source with no initial snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every handler as soon as it subscribes
    #[must_use]
    pub fn with_initial_snapshot(self, payload: Option<Value>) -> Self {
        self.lock().initial = Some(payload);
        self
    }

    /// Make every following `subscribe` fail with `reason`
    pub fn refuse_with(&self, reason: impl Into<String>) {
        self.lock().refusal = Some(reason.into());
    }

    /// Push a snapshot to every handler ever registered
    pub fn emit_snapshot(&self, payload: Value) {
        self.emit(&SourceEvent::Snapshot(Some(payload)));
    }

    /// Push an empty (absent) snapshot
    pub fn emit_absent(&self) {
        self.emit(&SourceEvent::Snapshot(None));
    }

    /// Push a transport error
    pub fn emit_error(&self, error: FeedError) {
        self.emit(&SourceEvent::Error(error));
    }

    /// Push an arbitrary event
    pub fn emit(&self, event: &SourceEvent) {
        let handlers: Vec<EventHandler> = self
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event.clone());
        }
    }

    /// Paths requested so far, in order
    #[must_use]
    pub fn subscribed_paths(&self) -> Vec<String> {
        self.lock()
            .handlers
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Number of successful `subscribe` calls
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Number of released subscriptions
    #[must_use]
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogSource for ScriptedCatalogSource {
    fn subscribe(&self, path: &str, handler: EventHandler) -> Result<Subscription, FeedError> {
        let initial = {
            let mut state = self.lock();
            if let Some(reason) = &state.refusal {
                return Err(FeedError::Subscription {
                    path: path.to_string(),
                    reason: reason.clone(),
                });
            }
            state.handlers.push((path.to_string(), Arc::clone(&handler)));
            state.initial.clone()
        };
        self.subscribed.fetch_add(1, Ordering::SeqCst);

        if let Some(payload) = initial {
            handler(SourceEvent::Snapshot(payload));
        }

        let unsubscribed = Arc::clone(&self.unsubscribed);
        Ok(Subscription::new(move || {
            unsubscribed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

impl std::fmt::Debug for ScriptedCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCatalogSource")
            .field("handlers", &self.lock().handlers.len())
            .field("subscribed", &self.subscribe_count())
            .field("unsubscribed", &self.unsubscribe_count())
            .finish()
    }
}
