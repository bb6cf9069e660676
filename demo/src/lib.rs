//! Demo session for the Bookshelf components
//!
//! A [`Session`] plays the part of the presentation layer: it follows the
//! catalog feed, keeps the lending store, and turns "borrow the book with this
//! id" into a validated borrow of the catalog record.

use anyhow::Context;
use bookshelf_catalog::{Catalog, CatalogFeed, FeedConfig, FeedHandle};
use bookshelf_core::listener::Subscription;
use bookshelf_core::source::CatalogSource;
use bookshelf_lending::{BORROW_LIMIT, LendingState, LendingStore};
use bookshelf_runtime::StoreConfig;
use serde_json::{Value, json};

/// A small catalog to seed a source with
#[must_use]
pub fn seed_catalog() -> Value {
    json!({
        "b1": {
            "title": "Dune",
            "author": "Frank Herbert",
            "genre": "Science Fiction",
            "pages": 412,
            "coverImage": "https://covers.example/dune.jpg",
            "description": "A desert planet and the spice everyone wants."
        },
        "b2": {
            "title": "The Hobbit",
            "author": "J. R. R. Tolkien",
            "genre": "Fantasy",
            "pages": 310,
            "coverImage": "https://covers.example/hobbit.jpg",
            "description": "There and back again."
        },
        "b3": {
            "title": "Neuromancer",
            "author": "William Gibson",
            "genre": "Cyberpunk",
            "pages": 271,
            "coverImage": "https://covers.example/neuromancer.jpg",
            "description": "The sky above the port was the color of television."
        },
        "b4": {
            "title": "Middlemarch",
            "author": "George Eliot",
            "genre": "Classic",
            "pages": 880,
            "coverImage": "https://covers.example/middlemarch.jpg",
            "description": "A study of provincial life."
        },
        "b5": {
            "title": "Broken Entry",
            "pages": "unknown"
        }
    })
}

/// Catalog feed and lending store wired together
pub struct Session<S> {
    feed: CatalogFeed<S>,
    handle: FeedHandle,
    lending: LendingStore,
    _listeners: Vec<Subscription>,
}

impl<S: CatalogSource> Session<S> {
    /// Starts following the catalog on `source`
    ///
    /// # Errors
    ///
    /// Fails if the source refuses the catalog subscription.
    pub fn start(source: S, config: FeedConfig) -> anyhow::Result<Self> {
        let feed = CatalogFeed::new(source, config);
        let lending = LendingStore::with_config(StoreConfig::new("lending"));

        let listeners = vec![
            feed.on_catalog_change(|catalog: &Catalog| {
                tracing::info!(books = catalog.len(), "Available Books ({})", catalog.len());
            }),
            feed.on_error(|error| {
                tracing::warn!(%error, "Catalog unavailable, showing last known books");
            }),
            lending.subscribe(|state: &LendingState| {
                tracing::info!(
                    borrowed = state.count(),
                    "{} of {BORROW_LIMIT} books borrowed",
                    state.count()
                );
            }),
        ];

        let handle = feed
            .start()
            .with_context(|| format!("opening catalog at '{}'", feed.config().collection_path))?;

        Ok(Self {
            feed,
            handle,
            lending,
            _listeners: listeners,
        })
    }

    /// Waits for the first catalog
    pub async fn loaded(&self) -> bool {
        self.handle.wait_until_loaded().await
    }

    /// Borrows the catalog book with `id`
    ///
    /// # Errors
    ///
    /// Fails if the book is not in the catalog or the borrow is refused.
    pub fn borrow(&self, id: &str) -> anyhow::Result<LendingState> {
        let catalog = self.handle.catalog();
        let book = catalog
            .get(id)
            .with_context(|| format!("book {id} is not in the catalog"))?;

        self.lending
            .borrow(book.clone())
            .with_context(|| format!("borrowing '{}'", book.title))
    }

    /// Returns the book with `id`
    pub fn return_book(&self, id: &str) -> LendingState {
        self.lending.return_book(id)
    }

    /// The latest catalog
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.handle.catalog()
    }

    /// The lending store
    #[must_use]
    pub const fn lending(&self) -> &LendingStore {
        &self.lending
    }

    /// Checks if the catalog has not arrived yet
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.feed.is_loading()
    }

    /// Stops following the catalog
    pub fn stop(&self) {
        self.handle.stop();
    }
}
