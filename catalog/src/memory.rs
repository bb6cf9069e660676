//! In-memory catalog source.
//!
//! Keeps collections as JSON values keyed by path and pushes the full
//! collection to every subscriber of a path whenever it changes. Useful for
//! demos, local development and tests that need a source with real state.

use bookshelf_core::listener::Subscription;
use bookshelf_core::source::{CatalogSource, EventHandler, FeedError, SourceEvent};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

struct Subscriber {
    id: u64,
    path: String,
    handler: EventHandler,
}

#[derive(Default)]
struct Collections {
    data: BTreeMap<String, Value>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

#[derive(Default)]
struct Inner {
    /// Held while a change is applied and pushed, so events keep their order
    delivery: Mutex<()>,
    collections: Mutex<Collections>,
}

impl Inner {
    fn collections(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Catalog source backed by in-memory JSON collections
///
/// Clones share the same collections. Handlers must not write back into the
/// source they are subscribed to.
///
/// # Example
///
/// ```
/// use bookshelf_catalog::InMemoryCatalogSource;
/// use serde_json::json;
///
/// let source = InMemoryCatalogSource::new();
/// source.put_entry("books", "k1", json!({ "title": "Dune" }));
/// assert_eq!(source.snapshot("books"), Some(json!({ "k1": { "title": "Dune" } })));
///
/// source.remove_entry("books", "k1");
/// assert_eq!(source.snapshot("books"), None);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryCatalogSource {
    inner: Arc<Inner>,
}

impl InMemoryCatalogSource {
    /// Create a source with no collections
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection at `path`
    ///
    /// `null` and empty objects or arrays remove the collection.
    pub fn set_collection(&self, path: &str, value: Value) {
        self.change(path, |data| {
            if is_empty(&value) {
                data.remove(path);
            } else {
                data.insert(path.to_string(), value);
            }
        });
    }

    /// Insert or replace the entry `key` in the collection at `path`
    ///
    /// A missing or non-object collection is replaced by a new object.
    pub fn put_entry(&self, path: &str, key: &str, entry: Value) {
        self.change(path, |data| {
            let collection = data
                .entry(path.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !collection.is_object() {
                *collection = Value::Object(Map::new());
            }
            if let Value::Object(entries) = collection {
                entries.insert(key.to_string(), entry);
            }
        });
    }

    /// Remove the entry `key` from the collection at `path`
    ///
    /// Removing the last entry removes the collection.
    pub fn remove_entry(&self, path: &str, key: &str) {
        self.change(path, |data| {
            let now_empty = match data.get_mut(path) {
                Some(Value::Object(entries)) => {
                    entries.remove(key);
                    entries.is_empty()
                }
                _ => false,
            };
            if now_empty {
                data.remove(path);
            }
        });
    }

    /// Remove the collection at `path`
    pub fn clear_collection(&self, path: &str) {
        self.change(path, |data| {
            data.remove(path);
        });
    }

    /// Push a transport error to every subscriber of `path`
    pub fn report_error(&self, path: &str, error: &FeedError) {
        let _delivery = self.inner.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let handlers = self.handlers_for(path);
        tracing::debug!(path, %error, subscribers = handlers.len(), "Reporting source error");

        for handler in handlers {
            handler(SourceEvent::Error(error.clone()));
        }
    }

    /// Current contents of the collection at `path`
    #[must_use]
    pub fn snapshot(&self, path: &str) -> Option<Value> {
        self.inner.collections().data.get(path).cloned()
    }

    /// Number of live subscriptions across all paths
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.collections().subscribers.len()
    }

    fn change<F>(&self, path: &str, mutate: F)
    where
        F: FnOnce(&mut BTreeMap<String, Value>),
    {
        let _delivery = self.inner.delivery.lock().unwrap_or_else(PoisonError::into_inner);

        let (snapshot, handlers) = {
            let mut collections = self.inner.collections();
            mutate(&mut collections.data);
            let snapshot = collections.data.get(path).cloned();
            let handlers = matching(&collections.subscribers, path);
            (snapshot, handlers)
        };

        tracing::trace!(path, subscribers = handlers.len(), "Collection changed");
        for handler in handlers {
            handler(SourceEvent::Snapshot(snapshot.clone()));
        }
    }

    fn handlers_for(&self, path: &str) -> Vec<EventHandler> {
        matching(&self.inner.collections().subscribers, path)
    }
}

fn matching(subscribers: &[Subscriber], path: &str) -> Vec<EventHandler> {
    subscribers
        .iter()
        .filter(|subscriber| subscriber.path == path)
        .map(|subscriber| Arc::clone(&subscriber.handler))
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(entries) => entries.is_empty(),
        Value::Array(entries) => entries.is_empty(),
        _ => false,
    }
}

impl CatalogSource for InMemoryCatalogSource {
    fn subscribe(&self, path: &str, handler: EventHandler) -> Result<Subscription, FeedError> {
        let _delivery = self.inner.delivery.lock().unwrap_or_else(PoisonError::into_inner);

        let (id, snapshot) = {
            let mut collections = self.inner.collections();
            let id = collections.next_id;
            collections.next_id += 1;
            collections.subscribers.push(Subscriber {
                id,
                path: path.to_string(),
                handler: Arc::clone(&handler),
            });
            (id, collections.data.get(path).cloned())
        };
        tracing::debug!(path, subscription_id = id, "Subscribed to in-memory collection");

        handler(SourceEvent::Snapshot(snapshot));

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.collections().subscribers.retain(|subscriber| subscriber.id != id);
                tracing::debug!(subscription_id = id, "Unsubscribed from in-memory collection");
            }
        }))
    }
}

impl std::fmt::Debug for InMemoryCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.inner.collections();
        f.debug_struct("InMemoryCatalogSource")
            .field("collections", &collections.data.keys().collect::<Vec<_>>())
            .field("subscribers", &collections.subscribers.len())
            .finish()
    }
}
