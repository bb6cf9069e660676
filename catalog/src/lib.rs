//! # Bookshelf Catalog
//!
//! Keeps a local read model of the remote book collection live.
//!
//! The remote store pushes the full collection on every change. The feed
//! decodes each push into an ordered [`Catalog`] and hands it on, either to a
//! [`CatalogSink`] ([`open`]) or to listeners registered on a
//! [`CatalogFeed`].
//!
//! ## Sources
//!
//! - [`InMemoryCatalogSource`]: keyed JSON collections held in memory
//! - [`BroadcastCatalogSource`]: events published on a tokio broadcast
//!   channel and forwarded by a task per subscription
//!
//! Any other transport plugs in through
//! [`CatalogSource`](bookshelf_core::CatalogSource).

pub mod broadcast;
pub mod catalog;
pub mod decode;
pub mod feed;
pub mod memory;

pub use broadcast::BroadcastCatalogSource;
pub use catalog::Catalog;
pub use decode::{Decoded, DroppedEntry, decode_snapshot};
pub use feed::{
    CatalogFeed, CatalogSink, DEFAULT_COLLECTION_PATH, FeedConfig, FeedHandle, FeedPhase, open,
};
pub use memory::InMemoryCatalogSource;
