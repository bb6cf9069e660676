//! Tokio broadcast catalog source.
//!
//! Snapshots and errors are published on a [`broadcast`] channel tagged with
//! their collection path. Each subscription runs a forwarding task on the
//! runtime that filters its path and calls the handler. The latest snapshot
//! per path is retained so a new subscriber starts from current data.
//!
//! A subscriber that falls behind the channel capacity receives
//! [`FeedError::Lagged`] followed by the newest events.

use bookshelf_core::listener::Subscription;
use bookshelf_core::source::{CatalogSource, EventHandler, FeedError, SourceEvent};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Clone, Debug)]
struct Published {
    path: Arc<str>,
    event: SourceEvent,
}

/// Catalog source fed through a tokio broadcast channel
///
/// # Example
///
/// ```
/// use bookshelf_catalog::BroadcastCatalogSource;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = BroadcastCatalogSource::new(16, tokio::runtime::Handle::current());
/// source.publish_snapshot("books", Some(json!({})));
/// assert_eq!(source.retained("books"), Some(Some(json!({}))));
/// # }
/// ```
#[derive(Clone)]
pub struct BroadcastCatalogSource {
    sender: broadcast::Sender<Published>,
    retained: Arc<Mutex<HashMap<String, Option<Value>>>>,
    runtime: Handle,
}

impl BroadcastCatalogSource {
    /// Create a source whose forwarding tasks run on `runtime`
    ///
    /// `capacity` is the number of events a slow subscriber may fall behind
    /// before it lags.
    #[must_use]
    pub fn new(capacity: usize, runtime: Handle) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            retained: Arc::new(Mutex::new(HashMap::new())),
            runtime,
        }
    }

    /// Publish the full contents of the collection at `path`
    ///
    /// Returns the number of subscriptions the event was queued for.
    pub fn publish_snapshot(&self, path: &str, payload: Option<Value>) -> usize {
        let mut retained = self.retained_map();
        retained.insert(path.to_string(), payload.clone());
        self.publish(path, SourceEvent::Snapshot(payload))
    }

    /// Publish a transport error for the collection at `path`
    pub fn publish_error(&self, path: &str, error: FeedError) -> usize {
        let _retained = self.retained_map();
        self.publish(path, SourceEvent::Error(error))
    }

    /// The latest snapshot published for `path`, if any
    #[must_use]
    pub fn retained(&self, path: &str) -> Option<Option<Value>> {
        self.retained_map().get(path).cloned()
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, path: &str, event: SourceEvent) -> usize {
        let published = Published {
            path: Arc::from(path),
            event,
        };
        // No receivers is not an error: nobody is listening yet
        self.sender.send(published).unwrap_or(0)
    }

    fn retained_map(&self) -> MutexGuard<'_, HashMap<String, Option<Value>>> {
        self.retained.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn forward(
    path: String,
    initial: Option<Option<Value>>,
    mut receiver: broadcast::Receiver<Published>,
    handler: EventHandler,
) {
    if let Some(payload) = initial {
        handler(SourceEvent::Snapshot(payload));
    }

    loop {
        match receiver.recv().await {
            Ok(published) if *published.path == *path => handler(published.event),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(%path, skipped, "Catalog subscriber lagged");
                handler(SourceEvent::Error(FeedError::Lagged(skipped)));
            }
            Err(RecvError::Closed) => {
                tracing::debug!(%path, "Catalog channel closed");
                break;
            }
        }
    }
}

impl CatalogSource for BroadcastCatalogSource {
    fn subscribe(&self, path: &str, handler: EventHandler) -> Result<Subscription, FeedError> {
        let (receiver, initial) = {
            let retained = self.retained_map();
            (self.sender.subscribe(), retained.get(path).cloned())
        };

        let task = self
            .runtime
            .spawn(forward(path.to_string(), initial, receiver, handler));
        let abort = task.abort_handle();
        tracing::debug!(path, "Forwarding task spawned");

        Ok(Subscription::new(move || abort.abort()))
    }
}

impl std::fmt::Debug for BroadcastCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastCatalogSource")
            .field("subscribers", &self.subscriber_count())
            .field("retained", &self.retained_map().len())
            .finish_non_exhaustive()
    }
}
