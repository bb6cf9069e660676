//! Remote catalog source abstraction.
//!
//! The remote store is an opaque push-subscription source: subscribing to a
//! collection path registers a handler that receives the **full** collection
//! snapshot on every change (no diffing contract), plus out-of-band transport
//! errors.
//!
//! ```text
//! ┌──────────────┐  SourceEvent::Snapshot   ┌──────────────┐
//! │ CatalogSource│ ───────────────────────▶ │  feed handler │
//! │  (transport) │  SourceEvent::Error      │  decode+sink  │
//! └──────────────┘ ───────────────────────▶ └──────────────┘
//! ```
//!
//! # Implementations
//!
//! - `InMemoryCatalogSource` and `BroadcastCatalogSource` in `bookshelf-catalog`
//! - `ScriptedCatalogSource` in `bookshelf-testing`
//!
//! Implementations are expected to retry/reconnect transparently. Reporting an
//! error never ends the subscription.

use crate::listener::Subscription;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a catalog source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Network or transport failure reported by the source
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source refused to open a subscription
    #[error("Subscription failed for '{path}': {reason}")]
    Subscription {
        /// The collection path that was requested
        path: String,
        /// The reason for failure
        reason: String,
    },

    /// The subscriber fell behind and snapshots were skipped
    #[error("Subscriber lagged, {0} snapshots skipped")]
    Lagged(u64),
}

/// One notification pushed by a catalog source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Full contents of the collection; `None` when the path holds no data
    Snapshot(Option<Value>),
    /// Transport-level failure; the subscription stays open
    Error(FeedError),
}

/// Callback a source invokes for each event, one at a time, in emission order
pub type EventHandler = Arc<dyn Fn(SourceEvent) + Send + Sync>;

/// A push-based source of catalog snapshots
///
/// # Contract
///
/// - `subscribe` registers `handler` for the collection at `path` and returns a
///   [`Subscription`] that unregisters it.
/// - The current snapshot is delivered as the first event (possibly before
///   `subscribe` returns), then one snapshot per change.
/// - Events for one subscription are delivered sequentially.
pub trait CatalogSource: Send + Sync {
    /// Subscribe to the collection at `path`
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Subscription`] if the source cannot serve `path`.
    fn subscribe(&self, path: &str, handler: EventHandler) -> Result<Subscription, FeedError>;
}

impl<S> CatalogSource for Arc<S>
where
    S: CatalogSource + ?Sized,
{
    fn subscribe(&self, path: &str, handler: EventHandler) -> Result<Subscription, FeedError> {
        (**self).subscribe(path, handler)
    }
}
