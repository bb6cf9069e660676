//! The live catalog feed.
//!
//! [`open`] subscribes to a collection on a [`CatalogSource`], rebuilds the
//! [`Catalog`] on every notification and hands it to a [`CatalogSink`].
//! [`CatalogFeed`] wraps the same machinery behind listener registration for
//! presentation code.
//!
//! # Teardown
//!
//! [`FeedHandle::stop`] (also run on drop) releases the remote subscription.
//! Once it returns the sink is never invoked again, even if the transport
//! still delivers a notification that was already in flight. Notifications are
//! serialized under a delivery lock and the stopped flag is checked under it.

use crate::catalog::Catalog;
use crate::decode::decode_snapshot;
use bookshelf_core::listener::{ListenerSet, Subscription};
use bookshelf_core::source::{CatalogSource, EventHandler, FeedError, SourceEvent};
use bookshelf_runtime::metrics::{
    CATALOG_BOOKS, CATALOG_ENTRIES_DROPPED_TOTAL, CATALOG_ERRORS_TOTAL, CATALOG_SNAPSHOTS_TOTAL,
};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tokio::sync::watch;

/// Default collection path of the remote catalog
pub const DEFAULT_COLLECTION_PATH: &str = "books";

/// Configuration for a catalog feed
///
/// # Example
///
/// ```
/// use bookshelf_catalog::FeedConfig;
///
/// let config = FeedConfig::default().with_endpoint("library-eu");
/// assert_eq!(config.collection_path, "books");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    /// Collection to subscribe to
    pub collection_path: String,
    /// Label of the remote endpoint, used in logs only
    pub endpoint: Option<String>,
}

impl FeedConfig {
    /// Create a configuration for `collection_path`
    #[must_use]
    pub fn new(collection_path: impl Into<String>) -> Self {
        Self {
            collection_path: collection_path.into(),
            endpoint: None,
        }
    }

    /// Set the collection path
    #[must_use]
    pub fn with_collection_path(mut self, collection_path: impl Into<String>) -> Self {
        self.collection_path = collection_path.into();
        self
    }

    /// Set the endpoint label
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_PATH)
    }
}

/// Receives what a feed produces
///
/// Both methods are called on the thread the source delivers on, one call at
/// a time.
pub trait CatalogSink: Send + Sync + 'static {
    /// A new catalog replaced the previous one
    fn catalog_changed(&self, catalog: &Catalog);

    /// The source reported a transport error; the feed keeps running
    fn feed_failed(&self, error: &FeedError);
}

impl<T: CatalogSink> CatalogSink for Arc<T> {
    fn catalog_changed(&self, catalog: &Catalog) {
        (**self).catalog_changed(catalog);
    }

    fn feed_failed(&self, error: &FeedError) {
        (**self).feed_failed(error);
    }
}

/// Lifecycle of a feed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    /// Waiting for the first notification
    Loading,
    /// At least one catalog was delivered
    Loaded,
    /// Stopped before anything was delivered
    Stopped,
}

struct FeedShared {
    path: String,
    stopped: AtomicBool,
    delivery: Mutex<()>,
    deliverer: Mutex<Option<ThreadId>>,
    catalog: RwLock<Catalog>,
    phase: watch::Sender<FeedPhase>,
    sink: Box<dyn CatalogSink>,
}

impl FeedShared {
    fn deliver(&self, event: SourceEvent) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if self.stopped.load(Ordering::Acquire) {
            tracing::trace!(path = %self.path, "Notification after stop ignored");
            return;
        }

        *self.deliverer.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        match event {
            SourceEvent::Snapshot(payload) => self.apply_snapshot(payload.as_ref()),
            SourceEvent::Error(error) => self.report_error(&error),
        }
        *self.deliverer.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply_snapshot(&self, payload: Option<&Value>) {
        let decoded = decode_snapshot(payload);

        if let Some(kind) = decoded.unexpected_payload {
            tracing::warn!(path = %self.path, kind, "Unexpected catalog payload, using an empty catalog");
        }
        for entry in &decoded.dropped {
            tracing::warn!(
                path = %self.path,
                key = %entry.key,
                reason = %entry.reason,
                "Dropped malformed catalog entry"
            );
        }

        metrics::counter!(CATALOG_SNAPSHOTS_TOTAL, "path" => self.path.clone()).increment(1);
        metrics::counter!(CATALOG_ENTRIES_DROPPED_TOTAL, "path" => self.path.clone())
            .increment(decoded.dropped.len() as u64);
        metrics::gauge!(CATALOG_BOOKS, "path" => self.path.clone())
            .set(decoded.catalog.len() as f64);

        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = decoded.catalog.clone();

        let first = self.phase.send_if_modified(|phase| {
            let loading = *phase == FeedPhase::Loading;
            if loading {
                *phase = FeedPhase::Loaded;
            }
            loading
        });
        if first {
            tracing::info!(path = %self.path, books = decoded.catalog.len(), "Catalog loaded");
        } else {
            tracing::debug!(path = %self.path, books = decoded.catalog.len(), "Catalog updated");
        }

        self.sink.catalog_changed(&decoded.catalog);
    }

    fn report_error(&self, error: &FeedError) {
        tracing::warn!(path = %self.path, %error, "Catalog source reported an error");
        metrics::counter!(CATALOG_ERRORS_TOTAL, "path" => self.path.clone()).increment(1);
        self.sink.feed_failed(error);
    }

    fn is_delivering_here(&self) -> bool {
        *self.deliverer.lock().unwrap_or_else(PoisonError::into_inner) == Some(thread::current().id())
    }
}

/// Subscribes `sink` to the collection named in `config`
///
/// The sink receives the full rebuilt catalog for the initial snapshot and
/// for every change after it. The initial snapshot may arrive before this
/// function returns.
///
/// # Errors
///
/// Returns [`FeedError::Subscription`] if the source refuses the
/// subscription.
#[tracing::instrument(
    skip_all,
    fields(path = %config.collection_path, endpoint = ?config.endpoint),
    name = "catalog_open"
)]
pub fn open<S, K>(source: &S, config: &FeedConfig, sink: K) -> Result<FeedHandle, FeedError>
where
    S: CatalogSource + ?Sized,
    K: CatalogSink,
{
    let (phase, _) = watch::channel(FeedPhase::Loading);
    let shared = Arc::new(FeedShared {
        path: config.collection_path.clone(),
        stopped: AtomicBool::new(false),
        delivery: Mutex::new(()),
        deliverer: Mutex::new(None),
        catalog: RwLock::new(Catalog::empty()),
        phase,
        sink: Box::new(sink),
    });

    let target = Arc::clone(&shared);
    let handler: EventHandler = Arc::new(move |event: SourceEvent| target.deliver(event));

    let subscription = source
        .subscribe(&config.collection_path, handler)
        .inspect_err(|error| tracing::warn!(%error, "Catalog subscription refused"))?;

    tracing::debug!("Catalog feed opened");
    Ok(FeedHandle {
        shared,
        subscription: Mutex::new(Some(subscription)),
    })
}

/// A running catalog feed
///
/// Dropping the handle stops the feed.
#[must_use = "dropping a FeedHandle stops the feed"]
pub struct FeedHandle {
    shared: Arc<FeedShared>,
    subscription: Mutex<Option<Subscription>>,
}

impl FeedHandle {
    /// Stops the feed
    ///
    /// Releases the remote subscription. After this returns the sink is not
    /// invoked again. If a notification is being delivered on another thread,
    /// waits for it to finish. Calling `stop` again does nothing; calling it
    /// from inside the sink is allowed.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }

        if !self.shared.is_delivering_here() {
            drop(self.shared.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }

        self.shared.phase.send_if_modified(|phase| {
            let loading = *phase == FeedPhase::Loading;
            if loading {
                *phase = FeedPhase::Stopped;
            }
            loading
        });
        tracing::info!(path = %self.shared.path, "Catalog feed stopped");
    }

    /// Checks if [`stop`](Self::stop) has been called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Checks if no notification has arrived yet
    ///
    /// A feed stopped before its first notification is not loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase() == FeedPhase::Loading
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> FeedPhase {
        *self.shared.phase.borrow()
    }

    /// Waits for the first notification
    ///
    /// Returns `true` once a catalog was delivered, or `false` if the feed
    /// was stopped first.
    pub async fn wait_until_loaded(&self) -> bool {
        let mut phase = self.shared.phase.subscribe();
        match phase.wait_for(|phase| *phase != FeedPhase::Loading).await {
            Ok(phase) => *phase == FeedPhase::Loaded,
            Err(_) => false,
        }
    }

    /// The most recently delivered catalog
    ///
    /// Empty until the first notification; transport errors leave it as is.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.shared
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The collection path this feed follows
    #[must_use]
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    fn phase_receiver(&self) -> watch::Receiver<FeedPhase> {
        self.shared.phase.subscribe()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHandle")
            .field("path", &self.shared.path)
            .field("phase", &self.phase())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Forwards feed output to registered listeners
struct FanOut {
    catalogs: ListenerSet<Catalog>,
    errors: ListenerSet<FeedError>,
}

impl CatalogSink for FanOut {
    fn catalog_changed(&self, catalog: &Catalog) {
        self.catalogs.notify(catalog);
    }

    fn feed_failed(&self, error: &FeedError) {
        self.errors.notify(error);
    }
}

/// Presentation-facing catalog feed
///
/// Register listeners, then [`start`](Self::start) the feed. Every started
/// feed delivers to all listeners registered at delivery time.
///
/// # Example
///
/// ```
/// use bookshelf_catalog::{CatalogFeed, FeedConfig, InMemoryCatalogSource};
/// use serde_json::json;
///
/// let source = InMemoryCatalogSource::new();
/// source.set_collection("books", json!({
///     "k1": {
///         "title": "Dune", "author": "Frank Herbert", "genre": "Science Fiction",
///         "pages": 412, "coverImage": "dune.jpg", "description": "Spice."
///     }
/// }));
///
/// let feed = CatalogFeed::new(source, FeedConfig::default());
/// let _on_change = feed.on_catalog_change(|catalog| println!("{} books", catalog.len()));
///
/// let handle = feed.start().unwrap();
/// assert!(!feed.is_loading());
/// assert_eq!(handle.catalog().len(), 1);
/// ```
pub struct CatalogFeed<S> {
    source: S,
    config: FeedConfig,
    catalogs: ListenerSet<Catalog>,
    errors: ListenerSet<FeedError>,
    latest: Mutex<Option<watch::Receiver<FeedPhase>>>,
}

impl<S: CatalogSource> CatalogFeed<S> {
    /// Create a feed over `source`
    #[must_use]
    pub fn new(source: S, config: FeedConfig) -> Self {
        Self {
            source,
            config,
            catalogs: ListenerSet::new(),
            errors: ListenerSet::new(),
            latest: Mutex::new(None),
        }
    }

    /// Register a listener for rebuilt catalogs
    pub fn on_catalog_change<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Catalog) + Send + 'static,
    {
        self.catalogs.subscribe(listener)
    }

    /// Register a listener for transport errors
    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&FeedError) + Send + 'static,
    {
        self.errors.subscribe(listener)
    }

    /// Start the feed
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Subscription`] if the source refuses the
    /// subscription.
    pub fn start(&self) -> Result<FeedHandle, FeedError> {
        let sink = FanOut {
            catalogs: self.catalogs.clone(),
            errors: self.errors.clone(),
        };
        let handle = open(&self.source, &self.config, sink)?;
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.phase_receiver());
        Ok(handle)
    }

    /// Checks if the most recently started feed is still waiting for data
    ///
    /// `true` before the first `start`.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|phase| *phase.borrow() == FeedPhase::Loading)
    }

    /// The feed configuration
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The underlying source
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<S> fmt::Debug for CatalogFeed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogFeed")
            .field("config", &self.config)
            .field("catalog_listeners", &self.catalogs.len())
            .field("error_listeners", &self.errors.len())
            .finish_non_exhaustive()
    }
}
